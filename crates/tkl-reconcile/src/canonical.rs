use tkl_schemas::AssetRecord;

/// Sort ascending by `contract`, byte-wise. Field values are untouched.
/// Records without a contract sort first.
pub fn canonicalize(mut assets: Vec<AssetRecord>) -> Vec<AssetRecord> {
    assets.sort_by(|a, b| {
        let ka = a.contract_id().map(str::as_bytes);
        let kb = b.contract_id().map(str::as_bytes);
        ka.cmp(&kb)
    });
    assets
}

/// Strictly ascending by contract: sorted and free of duplicates.
pub fn is_canonical(assets: &[AssetRecord]) -> bool {
    assets.windows(2).all(|w| {
        let a = w[0].contract_id().map(str::as_bytes);
        let b = w[1].contract_id().map(str::as_bytes);
        a < b
    })
}
