/// Boot diagnostics - classifies the ROM reset cause for the boot log and telemetry
use log::{info, warn};

/// Reason the chip came out of reset, as reported by the ROM for the PRO CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetCause {
    PowerOn,
    Software,
    LegacyWatchdog,
    DeepSleep,
    Sdio,
    Tg0WatchdogSys,
    Tg1WatchdogSys,
    RtcWatchdogSys,
    Intrusion,
    TgWatchdogCpu,
    SoftwareCpu,
    RtcWatchdogCpu,
    ExtCpu,
    RtcWatchdogBrownOut,
    RtcWatchdogRtc,
    Unknown,
}

impl ResetCause {
    /// Every defined cause, in ROM code order
    pub const ALL: [ResetCause; 15] = [
        ResetCause::PowerOn,
        ResetCause::Software,
        ResetCause::LegacyWatchdog,
        ResetCause::DeepSleep,
        ResetCause::Sdio,
        ResetCause::Tg0WatchdogSys,
        ResetCause::Tg1WatchdogSys,
        ResetCause::RtcWatchdogSys,
        ResetCause::Intrusion,
        ResetCause::TgWatchdogCpu,
        ResetCause::SoftwareCpu,
        ResetCause::RtcWatchdogCpu,
        ResetCause::ExtCpu,
        ResetCause::RtcWatchdogBrownOut,
        ResetCause::RtcWatchdogRtc,
    ];

    /// Stable symbolic label used in logs and the telemetry document
    pub fn label(self) -> &'static str {
        match self {
            ResetCause::PowerOn => "PowerOn",
            ResetCause::Software => "Software",
            ResetCause::LegacyWatchdog => "LegacyWdt",
            ResetCause::DeepSleep => "DeepSleep",
            ResetCause::Sdio => "Sdio",
            ResetCause::Tg0WatchdogSys => "Tg0WdtSys",
            ResetCause::Tg1WatchdogSys => "Tg1WdtSys",
            ResetCause::RtcWatchdogSys => "RtcWdtSys",
            ResetCause::Intrusion => "Intrusion",
            ResetCause::TgWatchdogCpu => "TgWdtCpu",
            ResetCause::SoftwareCpu => "SoftwareCpu",
            ResetCause::RtcWatchdogCpu => "RtcWdtCpu",
            ResetCause::ExtCpu => "ExtCpu",
            ResetCause::RtcWatchdogBrownOut => "RtcWdtBrownOut",
            ResetCause::RtcWatchdogRtc => "RtcWdtRtc",
            ResetCause::Unknown => "Unknown",
        }
    }

    /// Raw ROM code for a defined cause; `None` for `Unknown`
    pub fn code(self) -> Option<u32> {
        let code = match self {
            ResetCause::PowerOn => 1,
            ResetCause::Software => 3,
            ResetCause::LegacyWatchdog => 4,
            ResetCause::DeepSleep => 5,
            ResetCause::Sdio => 6,
            ResetCause::Tg0WatchdogSys => 7,
            ResetCause::Tg1WatchdogSys => 8,
            ResetCause::RtcWatchdogSys => 9,
            ResetCause::Intrusion => 10,
            ResetCause::TgWatchdogCpu => 11,
            ResetCause::SoftwareCpu => 12,
            ResetCause::RtcWatchdogCpu => 13,
            ResetCause::ExtCpu => 14,
            ResetCause::RtcWatchdogBrownOut => 15,
            ResetCause::RtcWatchdogRtc => 16,
            ResetCause::Unknown => return None,
        };
        Some(code)
    }

    pub fn is_watchdog(self) -> bool {
        matches!(
            self,
            ResetCause::LegacyWatchdog
                | ResetCause::Tg0WatchdogSys
                | ResetCause::Tg1WatchdogSys
                | ResetCause::RtcWatchdogSys
                | ResetCause::TgWatchdogCpu
                | ResetCause::RtcWatchdogCpu
                | ResetCause::RtcWatchdogRtc
        )
    }

    /// Resets that point at a fault rather than an intentional restart
    pub fn is_crash(self) -> bool {
        self.is_watchdog() || matches!(self, ResetCause::RtcWatchdogBrownOut | ResetCause::Intrusion)
    }
}

impl core::fmt::Display for ResetCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a raw ROM reset code to its cause. Total: unmapped codes are `Unknown`.
pub fn classify(raw_code: u32) -> ResetCause {
    match raw_code {
        1 => ResetCause::PowerOn,
        3 => ResetCause::Software,
        4 => ResetCause::LegacyWatchdog,
        5 => ResetCause::DeepSleep,
        6 => ResetCause::Sdio,
        7 => ResetCause::Tg0WatchdogSys,
        8 => ResetCause::Tg1WatchdogSys,
        9 => ResetCause::RtcWatchdogSys,
        10 => ResetCause::Intrusion,
        11 => ResetCause::TgWatchdogCpu,
        12 => ResetCause::SoftwareCpu,
        13 => ResetCause::RtcWatchdogCpu,
        14 => ResetCause::ExtCpu,
        15 => ResetCause::RtcWatchdogBrownOut,
        16 => ResetCause::RtcWatchdogRtc,
        _ => ResetCause::Unknown,
    }
}

/// Classify and log the reset cause once at boot
pub fn log_boot_reason(raw_code: u32) -> ResetCause {
    let cause = classify(raw_code);
    if cause.is_crash() {
        warn!("BOOT: Reset cause {} (code {}) - previous run did not shut down cleanly", cause, raw_code);
    } else {
        info!("BOOT: Reset cause {} (code {})", cause, raw_code);
    }
    cause
}
