//! The fixed step sequence of a core install
//!
//! Each [`Step`] advances the progress bar exactly once, however many commands
//! it runs. Within a step every command is attempted; the step fails with the
//! first error once all of them have run.

use regex::Regex;
use std::sync::LazyLock;

use super::decisions::{DEFAULT_SCAN_SCHEDULE, DISABLE_SSH, SCAN_SCHEDULE, UFW};
use super::dns::{self, Relaxation};
use crate::config::ConfigStore;
use crate::context::RunContext;
use crate::deploy::TargetFs;
use crate::error::Result;
use crate::packages::Packages;
use crate::patch::FilePatch;
use crate::runner::{Attempts, CommandRunner, CommandSpec};

/// What a step does
#[derive(Clone, Copy)]
pub enum StepAction {
    /// Deploy the bundled asset tree; progress advances once per file
    DeployAssets,
    Run(fn(&StepEnv<'_>) -> Result<()>),
}

/// A named unit of provisioning work
#[derive(Clone, Copy)]
pub struct Step {
    pub id: &'static str,
    /// Shown as the progress message while the step runs
    pub label: &'static str,
    /// Stop the run when this step fails
    pub fatal: bool,
    pub action: StepAction,
}

impl Step {
    const fn run(
        id: &'static str,
        label: &'static str,
        action: fn(&StepEnv<'_>) -> Result<()>,
    ) -> Self {
        Self {
            id,
            label,
            fatal: false,
            action: StepAction::Run(action),
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("fatal", &self.fatal)
            .finish_non_exhaustive()
    }
}

/// Everything a step may touch
pub struct StepEnv<'a> {
    pub ctx: &'a RunContext,
    pub store: &'a ConfigStore,
    pub runner: &'a dyn CommandRunner,
    pub target: &'a dyn TargetFs,
}

impl<'a> StepEnv<'a> {
    pub fn new(
        ctx: &'a RunContext,
        store: &'a ConfigStore,
        runner: &'a dyn CommandRunner,
        target: &'a dyn TargetFs,
    ) -> Self {
        Self {
            ctx,
            store,
            runner,
            target,
        }
    }

    pub fn packages(&self) -> Packages<'a> {
        Packages::new(self.ctx, self.runner)
    }
}

/// Build the step list for this host and configuration
pub fn core_steps(ctx: &RunContext, store: &ConfigStore) -> Vec<Step> {
    let mut steps = vec![
        Step {
            id: "files",
            label: "Installing Files",
            fatal: false,
            action: StepAction::DeployAssets,
        },
        Step::run("update", "Updating", update),
        Step::run("core-apps", "Installing Core Apps", install_core_apps),
        Step::run("remove-apps", "Removing Unneeded Apps", remove_unneeded_apps),
    ];

    if store.bool(UFW) {
        steps.push(Step::run("ufw", "Installing UFW", install_ufw));
    }

    steps.extend([
        Step::run("dns", "Securing DNS", dns::harden),
        Step::run("dns-test", "Testing DNS", test_dns),
        Step::run("dns-relax", "Relaxing DNS", relax_dns),
        Step::run("fail2ban", "Installing fail2ban", install_fail2ban),
        Step::run("clamav", "Installing ClamAV", install_clamav),
        Step::run("clamav-config", "Configuring ClamAV", configure_clamav),
        Step::run("security-tools", "Installing Security Tools", install_security_tools),
        Step::run("scan-schedule", "Scheduling Virus Scans", schedule_scans),
    ]);

    if ctx.is_dnf() {
        steps.extend([
            Step::run("rpm-repos", "Installing RPM repos", install_rpm_repos),
            Step::run("cleanup", "Cleaning Up", dnf_cleanup),
            Step::run("flatpak", "Installing flatpak", install_flatpak),
            Step::run("snap", "Installing snap", install_snap),
            Step::run("cleanup-again", "Cleaning Up", dnf_cleanup),
            Step::run("multimedia", "Updating multimedia codecs", install_multimedia),
            Step::run("webp", "Installing WebP support", install_webp),
        ]);
    }

    steps.push(Step::run("services", "Disabling Time Wasting Programs", disable_services));

    if ctx.is_apt() {
        steps.push(Step::run("ubuntu-extras", "Installing Ubuntu Extras", install_ubuntu_extras));
    }

    steps.extend([
        Step::run("python", "Installing Python", install_python),
        Step::run("c", "Installing C", install_c),
        Step::run("java", "Making Java", install_java),
        Step::run("git-node", "Installing Git and Node", install_git_node),
        Step::run("go", "Installing Go", install_go),
        Step::run("docker", "Installing Docker", install_docker),
        Step::run("common", "Installing Common Packages", install_common),
        Step::run("fonts", "Installing Fonts", install_fonts),
        Step::run("final-update", "Updating", update),
    ]);

    steps
}

fn systemctl(args: &[&str]) -> CommandSpec {
    CommandSpec::new("systemctl", args.iter().copied())
}

fn update(env: &StepEnv<'_>) -> Result<()> {
    env.packages().update(true)
}

fn install_core_apps(env: &StepEnv<'_>) -> Result<()> {
    env.packages().install(&["qemu-guest-agent", "tuned"])
}

const UNNEEDED_PACKAGES: &[&str] = &[
    "cifs-utils",
    "samba-common-libs",
    "samba-client-libs",
    "libsmbclient",
    "libwbclient",
    "samba-common",
    "sssd-krb5-common",
    "sssd-ipa",
    "sssd-nfs-idmap",
    "sssd-ldap",
    "sssd-client",
    "sssd-ad",
    "sssd-common",
    "sssd-krb5",
    "sssd-common-pac",
];

fn remove_unneeded_apps(env: &StepEnv<'_>) -> Result<()> {
    env.packages().remove_installed(UNNEEDED_PACKAGES)
}

fn install_ufw(env: &StepEnv<'_>) -> Result<()> {
    let mut attempts = Attempts::new();
    attempts.record(env.packages().install(&["ufw"]));
    attempts.check(env.runner, &systemctl(&["enable", "--now", "ufw"]));

    // flushing rules over SSH could drop the session's own allow rule
    if !env.ctx.remote_session {
        attempts.check(
            env.runner,
            &CommandSpec::shell("for i in $(ufw status | wc -l); do ufw --force delete 1; done"),
        );
    }

    for args in [
        &["default", "deny", "incoming"][..],
        &["default", "allow", "outgoing"],
        &["--force", "enable"],
    ] {
        attempts.check(env.runner, &CommandSpec::new("ufw", args.iter().copied()));
    }
    attempts.check(env.runner, &systemctl(&["disable", "--now", "firewalld"]));
    attempts.finish()
}

fn test_dns(env: &StepEnv<'_>) -> Result<()> {
    dns::relax_if_unreachable(env, Relaxation::AllowDowngrade).map(|_| ())
}

fn relax_dns(env: &StepEnv<'_>) -> Result<()> {
    dns::relax_if_unreachable(env, Relaxation::Disable).map(|_| ())
}

const JAIL_LOCAL: &str = "/etc/fail2ban/jail.local";
const JAIL_LOCAL_CONTENT: &str = "[DEFAULT]
ignoreip = 127.0.0.1/8 ::1
bantime = 3600
findtime = 600
maxretry = 5

[sshd]
enabled = true
";

fn install_fail2ban(env: &StepEnv<'_>) -> Result<()> {
    let mut attempts = Attempts::new();
    attempts.record(env.packages().install(&["fail2ban"]));
    attempts.record(FilePatch::open(env.target, JAIL_LOCAL).and_then(|mut jail| {
        jail.create_if_missing(JAIL_LOCAL_CONTENT);
        jail.save(env.target)
    }));
    attempts.check(env.runner, &systemctl(&["enable", "--now", "fail2ban"]));
    attempts.finish()
}

fn install_clamav(env: &StepEnv<'_>) -> Result<()> {
    let mut attempts = Attempts::new();
    attempts.record(env.packages().install(&["clamav", "clamd", "clamav-update", "cronie"]));

    // freshclam refuses to run while the service holds the database lock
    attempts.check(env.runner, &systemctl(&["stop", "clamav-freshclam"]));
    attempts.check(env.runner, &CommandSpec::new("freshclam", Vec::<String>::new()));
    attempts.check(env.runner, &systemctl(&["enable", "--now", "clamav-freshclam"]));
    attempts.check(env.runner, &CommandSpec::new("freshclam", Vec::<String>::new()));
    attempts.finish()
}

pub const QUARANTINE_DIR: &str = "/VirusScan/quarantine";
const SCAN_CONF: &str = "/etc/clamd.d/scan.conf";
const SCAN_SETTINGS: &[(&str, &str)] = &[
    ("ScanOnAccess", "ScanOnAccess yes"),
    ("OnAccessMountPath", "OnAccessMountPath /"),
    ("OnAccessPrevention", "OnAccessPrevention no"),
    ("OnAccessExtraScanning", "OnAccessExtraScanning yes"),
    ("OnAccessExcludeUID", "OnAccessExcludeUID 0"),
    ("User", "User root"),
];

fn configure_clamav(env: &StepEnv<'_>) -> Result<()> {
    env.target.create_dir_all(QUARANTINE_DIR, 0o700)?;

    let mut scan_conf = FilePatch::open(env.target, SCAN_CONF)?;
    for (key, line) in SCAN_SETTINGS {
        scan_conf.set_or_append(key, line)?;
    }
    scan_conf.save(env.target)?;
    Ok(())
}

fn install_security_tools(env: &StepEnv<'_>) -> Result<()> {
    let mut attempts = Attempts::new();
    attempts.record(env.packages().install(&["rkhunter", "bleachbit", "dnf-automatic", "pwgen"]));
    attempts.record(FilePatch::open(env.target, "/etc/dnf/automatic.conf").and_then(|mut conf| {
        conf.replace_line(r"^apply_updates\s*=.*$", "apply_updates = yes")?;
        conf.save(env.target)
    }));
    attempts.check(env.runner, &systemctl(&["enable", "--now", "dnf-automatic.timer"]));
    attempts.check(env.runner, &CommandSpec::new("rkhunter", ["--update", "-q"]));
    attempts.check(env.runner, &CommandSpec::new("rkhunter", ["--propupd", "-q"]));
    attempts.finish()
}

const SCAN_MARKER: &str = "# clamav-scan";

static CRON_SCHEDULE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[0-9*/,\-]+( [0-9*/,\-]+){4}$").ok());

/// Five cron fields, nothing that could escape the crontab line
pub fn is_valid_schedule(schedule: &str) -> bool {
    CRON_SCHEDULE
        .as_ref()
        .is_some_and(|re| re.is_match(schedule))
}

/// The crontab line registering the nightly full-disk scan
pub fn scan_cron_entry(schedule: &str) -> String {
    format!(
        "{schedule} nice -n 15 clamscan -r --bell \
         --move={QUARANTINE_DIR} --exclude-dir={QUARANTINE_DIR} \
         --exclude-dir=^/sys --exclude-dir=^/proc --exclude-dir=^/dev / {SCAN_MARKER}"
    )
}

fn schedule_scans(env: &StepEnv<'_>) -> Result<()> {
    let mut schedule = env.store.value(SCAN_SCHEDULE);
    if !is_valid_schedule(&schedule) {
        tracing::warn!("invalid scan schedule {schedule:?}, using {DEFAULT_SCAN_SCHEDULE}");
        schedule = DEFAULT_SCAN_SCHEDULE.to_string();
    }

    // only register once; an existing entry keeps its schedule
    let script = format!(
        "crontab -l 2>/dev/null | grep -qF '{SCAN_MARKER}' || \
         {{ crontab -l 2>/dev/null; echo '{}'; }} | crontab -",
        scan_cron_entry(&schedule)
    );
    env.runner.check(&CommandSpec::shell(&script)).map(|_| ())
}

fn install_rpm_repos(env: &StepEnv<'_>) -> Result<()> {
    let mut attempts = Attempts::new();
    for flavor in ["free", "nonfree"] {
        attempts.check(
            env.runner,
            &CommandSpec::shell(&format!(
                "dnf -y install https://download1.rpmfusion.org/{flavor}/fedora/rpmfusion-{flavor}-release-$(rpm -E %fedora).noarch.rpm"
            )),
        );
    }
    attempts.record(env.packages().install(&["fedora-workstation-repositories"]));
    attempts.check(env.runner, &CommandSpec::new("fedora-third-party", ["enable"]));
    attempts.check(env.runner, &CommandSpec::new("fedora-third-party", ["refresh"]));
    attempts.check(env.runner, &CommandSpec::new("dnf", ["-y", "groupupdate", "core"]));
    attempts.finish()
}

fn dnf_cleanup(env: &StepEnv<'_>) -> Result<()> {
    env.packages().dnf_cleanup()
}

fn install_flatpak(env: &StepEnv<'_>) -> Result<()> {
    let mut attempts = Attempts::new();
    attempts.record(env.packages().install(&["flatpak"]));
    attempts.check(
        env.runner,
        &CommandSpec::new(
            "flatpak",
            [
                "remote-add",
                "--if-not-exists",
                "flathub",
                "https://flathub.org/repo/flathub.flatpakrepo",
            ],
        ),
    );
    attempts.check(
        env.runner,
        &CommandSpec::new("flatpak", ["install", "-y", "flathub", "com.github.tchx84.Flatseal"]),
    );
    attempts.finish()
}

fn install_snap(env: &StepEnv<'_>) -> Result<()> {
    let mut attempts = Attempts::new();
    attempts.record(env.packages().install(&["snapd"]));

    // classic confinement expects /snap
    if env.target.dir_mode("/snap").is_none() {
        attempts.check(env.runner, &CommandSpec::new("ln", ["-s", "/var/lib/snapd/snap", "/snap"]));
    }
    attempts.check(env.runner, &systemctl(&["enable", "snapd", "--now"]));

    // the first refresh fails until snapd is seeded
    if let Err(e) = env.runner.check(&CommandSpec::new("snap", ["refresh"])) {
        tracing::debug!("initial snap refresh: {e}");
    }
    for args in [&["install", "core"][..], &["refresh", "core"], &["refresh"]] {
        attempts.check(env.runner, &CommandSpec::new("snap", args.iter().copied()));
    }
    attempts.finish()
}

fn install_multimedia(env: &StepEnv<'_>) -> Result<()> {
    let commands = [
        CommandSpec::new("dnf", ["-y", "--skip-broken", "install", "@multimedia"]),
        CommandSpec::new(
            "dnf",
            [
                "-y",
                "groupupdate",
                "multimedia",
                "--setop=install_weak_deps=False",
                "--exclude=PackageKit-gstreamer-plugin",
                "--skip-broken",
            ],
        ),
        CommandSpec::new("dnf", ["-y", "groupupdate", "sound-and-video"]),
        CommandSpec::new("dnf", ["-y", "--allowerasing", "install", "ffmpeg"]),
    ];
    crate::packages::run_all(env.runner, &commands)
}

fn install_webp(env: &StepEnv<'_>) -> Result<()> {
    let mut attempts = Attempts::new();
    attempts.record(env.packages().install(&["libwebp", "libwebp-devel"]));
    attempts.record(env.packages().install(&["webp-pixbuf-loader"]));
    attempts.finish()
}

fn disable_services(env: &StepEnv<'_>) -> Result<()> {
    let mut attempts = Attempts::new();
    attempts.check(env.runner, &systemctl(&["disable", "accounts-daemon.service"]));
    attempts.check(env.runner, &systemctl(&["disable", "debug-shell.service"]));

    if env.store.bool(DISABLE_SSH) {
        attempts.check(env.runner, &systemctl(&["disable", "--now", "sshd.socket"]));
        attempts.check(env.runner, &systemctl(&["disable", "--now", "sshd.service"]));
    }

    attempts.record(
        env.packages()
            .remove_installed(&["dmraid", "device-mapper-multipath"]),
    );
    attempts.finish()
}

fn install_ubuntu_extras(env: &StepEnv<'_>) -> Result<()> {
    env.packages().install(&["ubuntu-restricted-extras"])
}

fn install_python(env: &StepEnv<'_>) -> Result<()> {
    env.packages()
        .install(&["python", "python3", "python-pip", "python3-pip"])
}

fn install_c(env: &StepEnv<'_>) -> Result<()> {
    env.packages().install(&["gcc-c++", "make", "gcc"])
}

fn install_java(env: &StepEnv<'_>) -> Result<()> {
    if env.ctx.is_apt() {
        env.packages()
            .install(&["openjdk-8-jre", "openjdk-8-jdk", "openjdk-25-jre", "openjdk-25-jdk"])
    } else {
        env.packages()
            .install(&["java-1.8.0-openjdk", "java-25-openjdk", "java-latest-openjdk"])
    }
}

fn install_git_node(env: &StepEnv<'_>) -> Result<()> {
    env.packages().install(&["git", "nodejs", "npm"])
}

fn install_go(env: &StepEnv<'_>) -> Result<()> {
    env.packages().install(&["golang", "pcre-devel"])
}

// TODO: apt hosts need the docker.com apt repository and keyring before this
// step does anything there
fn install_docker(env: &StepEnv<'_>) -> Result<()> {
    if !env.ctx.is_dnf() {
        return Ok(());
    }

    let mut attempts = Attempts::new();
    let packages = env.packages();
    attempts.record(packages.install(&["dnf-plugins-core"]));
    attempts.check(
        env.runner,
        &CommandSpec::new(
            "dnf",
            [
                "config-manager",
                "--add-repo",
                "https://download.docker.com/linux/fedora/docker-ce.repo",
            ],
        ),
    );
    attempts.record(packages.install(&[
        "docker-ce",
        "docker-ce-cli",
        "containerd.io",
        "docker-buildx-plugin",
        "docker-compose-plugin",
    ]));
    attempts.record(packages.install(&["docker"]));
    attempts.check(env.runner, &systemctl(&["enable", "docker", "--now"]));
    attempts.finish()
}

const COMMON_PACKAGES: &[&str] = &[
    "nano",
    "micro",
    "neofetch",
    "btrfs-progs",
    "lvm2",
    "xfsprogs",
    "ntfs-3g",
    "ntfsprogs",
    "exfatprogs",
    "udftools",
    "p7zip",
    "p7zip-plugins",
    "hplip",
    "hplip-gui",
    "inotify-tools",
    "guvcview",
    "selinux-policy-devel",
];

fn install_common(env: &StepEnv<'_>) -> Result<()> {
    let mut attempts = Attempts::new();
    attempts.record(env.packages().install(COMMON_PACKAGES));
    attempts.check(env.runner, &systemctl(&["enable", "fstrim.timer", "--now"]));
    attempts.check(env.runner, &systemctl(&["enable", "systemd-oomd.service", "--now"]));

    if !env.store.bool(DISABLE_SSH) {
        attempts.check(env.runner, &systemctl(&["enable", "sshd.socket", "--now"]));
    }
    attempts.finish()
}

fn install_fonts(env: &StepEnv<'_>) -> Result<()> {
    env.packages().install(&["jetbrains-mono-fonts"])
}
