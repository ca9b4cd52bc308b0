//! Resolver hardening for systemd-resolved
//!
//! Strict settings (DNS-over-TLS with DNSSEC enforced) break name resolution
//! on some networks. After applying them the resolver is probed, and DNSSEC is
//! relaxed in two stages while the probe keeps failing:
//!
//! 1. `DNSSEC=allow-downgrade`
//! 2. `DNSSEC` commented out, leaving the resolver default

use tracing::{debug, warn};

use super::decisions::{CLOUDFLARE_DNS, GOOGLE_FALLBACK_DNS};
use super::steps::StepEnv;
use crate::config::ConfigStore;
use crate::error::Result;
use crate::patch::FilePatch;
use crate::runner::{Attempts, CommandRunner, CommandSpec};

pub const RESOLVED_CONF: &str = "/etc/systemd/resolved.conf";

const CLOUDFLARE_DNS_SERVERS: &str =
    "1.1.1.2#security.cloudflare-dns.com 2606:4700:4700::1112#security.cloudflare-dns.com";
const CLOUDFLARE_FALLBACK_SERVERS: &str = "1.0.0.2#security.cloudflare-dns.com";
const CLOUDFLARE_DOMAINS: &str =
    "security.cloudflare-dns.com?ip=1.1.1.2&name=Cloudflare&blockedif=zeroip dns.google";
const GOOGLE_DNS_SERVERS: &str = "8.8.8.8#dns.google 2001:4860:4860::8888#dns.google";
const GOOGLE_FALLBACK_SERVERS: &str = "8.8.4.4#dns.google 2001:4860:4860::8844#dns.google";
const GOOGLE_DOMAINS: &str = "dns.google";

/// How far DNSSEC enforcement is loosened after a failed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relaxation {
    AllowDowngrade,
    Disable,
}

/// `resolved.conf` settings for the DNS decisions, in the order applied
pub fn resolver_settings(store: &ConfigStore) -> Vec<(&'static str, &'static str)> {
    let mut settings = vec![("DNSSEC", "yes"), ("DNSOverTLS", "yes"), ("Cache", "yes")];

    if store.bool(CLOUDFLARE_DNS) {
        settings.push(("DNS", CLOUDFLARE_DNS_SERVERS));
        if store.bool(GOOGLE_FALLBACK_DNS) {
            settings.push(("FallbackDNS", GOOGLE_FALLBACK_SERVERS));
        } else {
            settings.push(("FallbackDNS", CLOUDFLARE_FALLBACK_SERVERS));
        }
        settings.push(("Domains", CLOUDFLARE_DOMAINS));
    } else {
        settings.push(("DNS", GOOGLE_DNS_SERVERS));
        settings.push(("FallbackDNS", GOOGLE_FALLBACK_SERVERS));
        settings.push(("Domains", GOOGLE_DOMAINS));
    }

    settings
}

/// Apply the strict settings and restart the resolver
///
/// A host without `resolved.conf` is left unpatched; the restart still runs.
pub fn harden(env: &StepEnv<'_>) -> Result<()> {
    let mut attempts = Attempts::new();
    attempts.record(apply_settings(env));
    attempts.check(env.runner, &restart_resolver());
    attempts.finish()
}

fn apply_settings(env: &StepEnv<'_>) -> Result<()> {
    let mut patch = FilePatch::open(env.target, RESOLVED_CONF)?;
    if !patch.exists() {
        warn!("{} not found, resolver left unchanged", patch.path());
        return Ok(());
    }

    for (key, value) in resolver_settings(env.store) {
        if !patch.set_key(key, value)? {
            debug!("{RESOLVED_CONF}: no {key} line to set");
        }
    }
    patch.save(env.target)?;
    Ok(())
}

/// Whether names currently resolve
pub fn probe(runner: &dyn CommandRunner) -> bool {
    let cmd = CommandSpec::new("timeout", ["10", "ping", "-c1", "google.com"]);
    match runner.run(&cmd) {
        Ok(output) => output.success,
        Err(e) => {
            debug!("DNS probe could not run: {e}");
            false
        }
    }
}

/// Probe, and loosen DNSSEC one stage if resolution is broken
///
/// Returns whether a relaxation was applied.
pub fn relax_if_unreachable(env: &StepEnv<'_>, relaxation: Relaxation) -> Result<bool> {
    if probe(env.runner) {
        return Ok(false);
    }
    warn!("DNS probe failed, relaxing DNSSEC ({relaxation:?})");

    let mut patch = FilePatch::open(env.target, RESOLVED_CONF)?;
    match relaxation {
        Relaxation::AllowDowngrade => {
            patch.replace_line("^DNSSEC=.*$", "DNSSEC=allow-downgrade")?;
        }
        Relaxation::Disable => {
            patch.comment_out("DNSSEC")?;
        }
    }
    patch.save(env.target)?;

    env.runner.check(&restart_resolver())?;
    Ok(true)
}

fn restart_resolver() -> CommandSpec {
    CommandSpec::new("systemctl", ["restart", "systemd-resolved"])
}
