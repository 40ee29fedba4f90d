//! Reboot and refresh of the reader after an update.
//!
//! Both actions run an argv from the `[device]` config table; an empty argv
//! turns the action into a message only.

use std::process::Command;

use mailbook_core::config::DeviceConfig;
use mailbook_core::reconcile::DeviceAction;

/// The argv configured for `action`
pub fn command_for(action: DeviceAction, device: &DeviceConfig) -> &[String] {
    match action {
        DeviceAction::Reboot => &device.reboot_command,
        DeviceAction::Refresh => &device.refresh_command,
    }
}

/// Run the configured command for `action`
/// Returns true on success, false on error
pub fn perform(action: DeviceAction, device: &DeviceConfig) -> bool {
    match action {
        DeviceAction::Reboot => println!("Rebooting system..."),
        DeviceAction::Refresh => println!("Refreshing library."),
    }

    let Some((program, args)) = command_for(action, device).split_first() else {
        log::debug!("No command configured for {:?}", action);
        return true;
    };

    match Command::new(program).args(args).status() {
        Ok(status) if status.success() => true,
        Ok(status) => {
            eprintln!("✗ {} exited with {}", program, status);
            false
        }
        Err(e) => {
            eprintln!("✗ Failed to run {}: {}", program, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_commands() {
        let device = DeviceConfig::default();
        assert_eq!(command_for(DeviceAction::Reboot, &device), ["reboot"]);
        assert_eq!(command_for(DeviceAction::Refresh, &device)[0], "dbus-send");
    }

    #[test]
    fn test_empty_command_is_skipped() {
        let device = DeviceConfig {
            reboot_command: Vec::new(),
            refresh_command: Vec::new(),
        };
        assert!(perform(DeviceAction::Refresh, &device));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_exit_status() {
        let device = DeviceConfig {
            reboot_command: vec!["false".to_string()],
            refresh_command: vec!["true".to_string()],
        };
        assert!(perform(DeviceAction::Refresh, &device));
        assert!(!perform(DeviceAction::Reboot, &device));
    }
}
