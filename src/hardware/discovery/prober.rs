//! Transport Prober
//!
//! Runs smartctl against a device once per bridge hint until one attempt
//! yields a usable report. USB enclosures hide the drive behind a bridge
//! chip whose SMART passthrough protocol is unknown up front, so each
//! hint is tried in turn.

use crate::domain::ports::ProcessRunnerRef;
use crate::error::{Error, Result};
use crate::hardware::smart::{ReportError, SmartReport};
use tracing::{debug, warn};

/// Bridge hints in the order they are tried; `None` probes without `-d`
pub const BRIDGE_HINTS: [Option<&str>; 5] = [
    None,
    Some("sat"),
    Some("usbsunplus"),
    Some("usbjmicron"),
    Some("usbcypress"),
];

/// Default name of the probing tool
pub const DEFAULT_TOOL: &str = "smartctl";

// =============================================================================
// Attempt Outcomes
// =============================================================================

/// Outcome of one invocation with one hint
#[derive(Debug)]
enum ProbeAttempt {
    Success(SmartReport),
    BridgeUnsupported,
    OtherError(String),
}

/// A report together with the hint that produced it
#[derive(Debug, Clone)]
pub struct ProbeSuccess {
    pub report: SmartReport,
    pub hint: Option<&'static str>,
}

// =============================================================================
// Transport Prober
// =============================================================================

/// Probes devices through the external SMART tool
#[derive(Clone)]
pub struct TransportProber {
    runner: ProcessRunnerRef,
    tool: String,
}

impl TransportProber {
    pub fn new(runner: ProcessRunnerRef, tool: impl Into<String>) -> Self {
        Self {
            runner,
            tool: tool.into(),
        }
    }

    /// Name or path of the tool being invoked
    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub(crate) fn runner(&self) -> &ProcessRunnerRef {
        &self.runner
    }

    /// Obtain a report for `device`, falling back through [`BRIDGE_HINTS`].
    ///
    /// When every hint fails, the error is derived from the last attempt:
    /// a bridge rejection becomes [`Error::ProbeUnsupportedBridge`], anything
    /// else [`Error::ProbeFailed`].
    pub async fn probe(&self, device: &str) -> Result<ProbeSuccess> {
        let mut last = None;

        for hint in BRIDGE_HINTS {
            match self.attempt(device, hint).await? {
                ProbeAttempt::Success(report) => {
                    debug!(device, hint = hint.unwrap_or("auto"), "Probe succeeded");
                    return Ok(ProbeSuccess { report, hint });
                }
                failed => {
                    debug!(device, hint = hint.unwrap_or("auto"), outcome = ?failed, "Probe attempt failed");
                    last = Some(failed);
                }
            }
        }

        Err(match last {
            Some(ProbeAttempt::BridgeUnsupported) => {
                warn!(device, "No bridge hint could read the device");
                Error::ProbeUnsupportedBridge {
                    device: device.to_string(),
                }
            }
            Some(ProbeAttempt::OtherError(reason)) => Error::ProbeFailed {
                device: device.to_string(),
                reason,
            },
            Some(ProbeAttempt::Success(_)) | None => Error::ProbeFailed {
                device: device.to_string(),
                reason: "no probe attempts were made".to_string(),
            },
        })
    }

    /// Whether any hint yields a usable report for `device`
    pub async fn can_read(&self, device: &str) -> bool {
        self.probe(device).await.is_ok()
    }

    /// Verify the tool can be spawned at all
    pub async fn check_installed(&self) -> Result<()> {
        match self.runner.run(&self.tool, &["--version"]).await {
            Ok(_) => Ok(()),
            Err(Error::Io(e)) => {
                debug!(tool = %self.tool, error = %e, "Tool spawn failed");
                Err(self.not_installed())
            }
            Err(e) => Err(e),
        }
    }

    async fn attempt(&self, device: &str, hint: Option<&str>) -> Result<ProbeAttempt> {
        let mut args = vec!["--all", "-j"];
        if let Some(hint) = hint {
            args.extend(["-d", hint]);
        }
        args.push(device);

        let output = match self.runner.run(&self.tool, &args).await {
            Ok(output) => output,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(self.not_installed());
            }
            Err(e) => return Ok(ProbeAttempt::OtherError(e.to_string())),
        };

        // Non-zero exits are common and their output is still inspected
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            let status = output
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Ok(ProbeAttempt::OtherError(format!(
                "tool exited with status {} and no usable output",
                status
            )));
        }

        Ok(match SmartReport::parse(&output.stdout) {
            Ok(report) => ProbeAttempt::Success(report),
            Err(ReportError::UnsupportedBridge) => ProbeAttempt::BridgeUnsupported,
            Err(ReportError::Malformed(reason)) => ProbeAttempt::OtherError(reason),
        })
    }

    fn not_installed(&self) -> Error {
        Error::ToolNotInstalled {
            tool: self.tool.clone(),
            hint: install_hint().to_string(),
        }
    }
}

/// Platform-specific instruction for installing smartmontools
pub fn install_hint() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install it with: brew install smartmontools"
    } else if cfg!(target_os = "linux") {
        "Install it with: sudo apt install smartmontools (Debian/Ubuntu) \
         or sudo yum install smartmontools (RedHat/CentOS)"
    } else {
        "Download it from https://www.smartmontools.org/"
    }
}
