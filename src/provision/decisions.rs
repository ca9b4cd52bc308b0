//! The configuration decisions of a core install, asked in a fixed order

use crate::config::{AnswersFile, ConfigStore};
use crate::context::RunContext;
use crate::error::Result;

pub const UFW: &str = "ufw";
pub const CLOUDFLARE_DNS: &str = "cloudflareDNS";
pub const GOOGLE_FALLBACK_DNS: &str = "googleFallbackDNS";
pub const DISABLE_SSH: &str = "disableSSH";
pub const SCAN_SCHEDULE: &str = "scanSchedule";

/// Nightly at 02:00
pub const DEFAULT_SCAN_SCHEDULE: &str = "0 2 * * *";

/// Resolve every decision before anything is installed
///
/// Order matters: the Google fallback question only exists once Cloudflare DNS
/// was accepted, and some decisions are fixed by the host instead of asked.
/// Preseeded answers replace the built-in defaults. An interrupted prompt stops
/// collection at that question.
pub fn collect_decisions(
    store: &mut ConfigStore,
    ctx: &RunContext,
    answers: &AnswersFile,
) -> Result<()> {
    // apt hosts have no firewalld to fall back to
    if ctx.is_dnf() {
        store.add_bool(
            UFW,
            "Would you like to install UFW (Uncomplicated Firewall)?",
            answers.bool_default(UFW, true),
        )?;
    } else {
        store.set_bool(UFW, true);
    }

    if store.add_bool(
        CLOUDFLARE_DNS,
        "Would you like to use Cloudflare DNS?",
        answers.bool_default(CLOUDFLARE_DNS, true),
    )? {
        store.add_bool(
            GOOGLE_FALLBACK_DNS,
            "Would you like to use Google DNS as a fallback?",
            answers.bool_default(GOOGLE_FALLBACK_DNS, true),
        )?;
    }

    // never lock out the session doing the provisioning
    if ctx.remote_session {
        store.set_bool(DISABLE_SSH, false);
    } else {
        store.add_bool(
            DISABLE_SSH,
            "Would you like to disable SSH?",
            answers.bool_default(DISABLE_SSH, true),
        )?;
    }

    store.add_value(
        SCAN_SCHEDULE,
        "When should the daily virus scan run? (cron schedule)",
        &answers.text_default(SCAN_SCHEDULE, DEFAULT_SCAN_SCHEDULE),
    )?;
    Ok(())
}
