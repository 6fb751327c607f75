use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::process::Command;

/// A wireless interface as reported by `iw dev`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirelessInterface {
    pub name: String,
    pub mode: String,
}

impl WirelessInterface {
    pub fn is_monitor(&self) -> bool {
        self.mode == "monitor"
    }
}

fn run_iw(args: &[&str]) -> Result<String> {
    let output = Command::new("iw")
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute iw {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("iw {} failed: {}", args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Tune a monitor interface to `channel`
pub fn set_channel(interface: &str, channel: u8) -> Result<()> {
    run_iw(&["dev", interface, "set", "channel", &channel.to_string()])?;
    debug!("{} tuned to channel {}", interface, channel);
    Ok(())
}

/// Put an interface into monitor mode (needs root)
pub fn set_monitor_mode(interface: &str) -> Result<()> {
    info!("Setting {} to monitor mode", interface);

    let link = |state: &str| -> Result<()> {
        let output = Command::new("ip")
            .args(["link", "set", interface, state])
            .output()
            .with_context(|| format!("Failed to bring interface {}", state))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ip link set {} {} failed: {}", interface, state, stderr.trim());
        }
        Ok(())
    };

    if let Err(e) = link("down") {
        warn!("{}", e);
    }
    run_iw(&["dev", interface, "set", "type", "monitor"])?;
    link("up")?;

    info!("Interface {} is now in monitor mode", interface);
    Ok(())
}

pub fn is_monitor_mode(interface: &str) -> Result<bool> {
    let info = run_iw(&["dev", interface, "info"])?;
    Ok(info.lines().any(|l| l.trim() == "type monitor"))
}

pub fn list_wireless_interfaces() -> Result<Vec<WirelessInterface>> {
    Ok(parse_iw_dev(&run_iw(&["dev"])?))
}

pub fn find_monitor_interface() -> Result<Option<String>> {
    Ok(list_wireless_interfaces()?
        .into_iter()
        .find(WirelessInterface::is_monitor)
        .map(|iface| iface.name))
}

/// Parse the `Interface` / `type` pairs out of `iw dev` output
pub fn parse_iw_dev(output: &str) -> Vec<WirelessInterface> {
    let mut interfaces: Vec<WirelessInterface> = Vec::new();

    for line in output.lines().map(str::trim) {
        if let Some(name) = line.strip_prefix("Interface ") {
            interfaces.push(WirelessInterface {
                name: name.trim().to_string(),
                mode: "unknown".to_string(),
            });
        } else if let Some(mode) = line.strip_prefix("type ") {
            if let Some(current) = interfaces.last_mut() {
                current.mode = mode.trim().to_string();
            }
        }
    }

    interfaces
}

/// Pick the interface to capture on: the configured one if it is already in
/// monitor mode (or `set_monitor` asks to switch it), otherwise the first
/// monitor interface found.
pub fn resolve_monitor_interface(configured: &str, set_monitor: bool) -> Result<String> {
    if set_monitor {
        set_monitor_mode(configured)
            .with_context(|| format!("Failed to set monitor mode on '{}'", configured))?;
        return Ok(configured.to_string());
    }

    if is_monitor_mode(configured).unwrap_or(false) {
        return Ok(configured.to_string());
    }

    match find_monitor_interface()? {
        Some(found) => {
            info!("Auto-detected monitor interface: {}", found);
            Ok(found)
        }
        None => bail!(
            "Interface {} is not in monitor mode and no monitor interface was found.\n\
             Use --set-monitor, or switch to the iw backend in config.json.",
            configured
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IW_DEV: &str = "phy#1
\tInterface wlan1mon
\t\tifindex 5
\t\twdev 0x100000002
\t\taddr 00:c0:ca:aa:bb:cc
\t\ttype monitor
\t\tchannel 6 (2437 MHz), width: 20 MHz (no HT), center1: 2437 MHz
phy#0
\tInterface wlan0
\t\tifindex 3
\t\ttype managed
\t\ttxpower 22.00 dBm
";

    #[test]
    fn test_parse_iw_dev() {
        let interfaces = parse_iw_dev(IW_DEV);
        assert_eq!(
            interfaces,
            vec![
                WirelessInterface {
                    name: "wlan1mon".to_string(),
                    mode: "monitor".to_string()
                },
                WirelessInterface {
                    name: "wlan0".to_string(),
                    mode: "managed".to_string()
                },
            ]
        );
        assert!(interfaces[0].is_monitor());
        assert!(!interfaces[1].is_monitor());
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_iw_dev("").is_empty());
    }
}
