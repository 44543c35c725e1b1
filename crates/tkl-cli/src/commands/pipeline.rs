//! Reconciliation commands: verify (dry run) and merge.

use super::Context;
use anyhow::{bail, Context as _, Result};
use std::sync::Arc;
use tkl_dispatch::{CommandTrustlines, Dispatcher, LoggingHook, TrustlineHook};
use tkl_network::RetryPolicy;
use tkl_reconcile::{ReconcileConfig, ReconcileOutcome, ReconciliationEngine};
use tkl_schemas::AssetRecord;
use tracing::{info, warn};

async fn reconcile(ctx: &Context, allow_mass_removal: bool) -> Result<ReconcileOutcome> {
    let existing = tkl_store::load_registry(&ctx.registry_path)?;
    let source = tkl_store::read_candidates(&ctx.assets_dir)?;

    let engine = ReconciliationEngine::new(
        ReconcileConfig {
            min_candidates: ctx.cfg.reconcile.min_candidates,
            max_removal_ratio: ctx.cfg.reconcile.max_removal_ratio,
            max_concurrency: ctx.cfg.verify.max_concurrency,
            allow_mass_removal,
        },
        ctx.verifier()?,
    );

    let mut outcome = engine
        .run(&existing, &source.candidates)
        .await
        .context("RECONCILE_REFUSED")?;

    outcome.violations.extend(source.unreadable);
    outcome.violations.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(outcome)
}

fn report(outcome: &ReconcileOutcome) -> Result<()> {
    let c = &outcome.changes;
    for k in &c.added {
        println!("added={}", k);
    }
    for (k, fields) in &c.updated {
        println!("updated={} fields={}", k, fields.join(","));
    }
    for k in &c.removed {
        println!("removed={}", k);
    }
    for v in &outcome.violations {
        eprintln!("VIOLATION: {}", v);
    }
    println!("summary={}", serde_json::to_string(&outcome.summary())?);
    Ok(())
}

fn fail_on_violations(outcome: &ReconcileOutcome) -> Result<()> {
    if !outcome.is_clean() {
        bail!(
            "CANDIDATE_VIOLATIONS: {} violation(s); fix the listed files and re-run",
            outcome.violations.len()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

pub async fn verify(ctx: &Context, allow_mass_removal: bool) -> Result<()> {
    let outcome = reconcile(ctx, allow_mass_removal).await?;
    report(&outcome)?;
    println!("written=false");
    fail_on_violations(&outcome)
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

pub async fn merge(ctx: &Context, allow_mass_removal: bool) -> Result<()> {
    let outcome = reconcile(ctx, allow_mass_removal).await?;
    report(&outcome)?;

    let strict = ctx.cfg.reconcile.strict;
    let written = outcome.should_write(strict);
    if written {
        tkl_store::save_registry_atomic(&ctx.registry_path, &outcome.registry)?;
    } else if !outcome.changes.is_empty() {
        warn!(
            violations = outcome.violations.len(),
            "strict mode: registry write blocked by violations"
        );
    }
    println!("written={}", written);

    if written && ctx.cfg.dispatch.enabled {
        let admitted: Vec<AssetRecord> = outcome
            .changes
            .admitted()
            .into_iter()
            .filter_map(|c| outcome.registry.find(c).cloned())
            .collect();

        let dispatcher = dispatcher(ctx)?;
        info!(hooks = ?dispatcher.hook_names(), records = admitted.len(), "dispatching admission hooks");
        let drained = dispatcher
            .dispatch(&admitted)
            .drain(ctx.cfg.dispatch.drain_timeout())
            .await;
        println!(
            "hooks_succeeded={} hooks_skipped={} hooks_failed={} hooks_abandoned={}",
            drained.succeeded, drained.skipped, drained.failed, drained.abandoned
        );
    }

    fail_on_violations(&outcome)
}

fn dispatcher(ctx: &Context) -> Result<Dispatcher> {
    let d = &ctx.cfg.dispatch;
    let mut dispatcher = Dispatcher::new().with_hook(Arc::new(LoggingHook));

    if d.trustlines_enabled() {
        let secrets = tkl_config::resolve_secrets(&ctx.cfg, true)?;
        let (Some(account), Some(secret)) = (&d.trustline_account, secrets.trustline_signer) else {
            bail!("CONFIG_INVALID: trustlines enabled without account or signer");
        };
        let submitter = CommandTrustlines::new(
            ctx.horizon()?,
            account,
            d.trustline_command.clone(),
            &d.signer_key_env,
            secret,
        )?;
        let retry = RetryPolicy {
            max_attempts: d.max_attempts,
            base_fee: d.base_fee,
            base_delay: d.base_delay(),
        };
        dispatcher = dispatcher.with_hook(Arc::new(TrustlineHook::new(Arc::new(submitter), retry)));
    }

    Ok(dispatcher)
}
