//! GPU probe via `nvidia-smi`.
//!
//! A missing binary, a non-zero exit, or unparseable output all mean "no
//! GPU" rather than an error: GPU-less hosts are a normal state that the
//! slow tier represents with an explicit `None`.

use tokio::process::Command;
use tracing::debug;

use crate::Result;
use crate::stats::GpuStats;

const QUERY_FIELDS: &str =
    "name,utilization.gpu,memory.total,memory.used,temperature.gpu,fan.speed,power.draw";

pub(crate) struct GpuProbe {
    binary: String,
}

impl GpuProbe {
    pub(crate) fn new() -> Self {
        Self {
            binary: "nvidia-smi".to_string(),
        }
    }

    pub(crate) async fn query(&self) -> Result<Option<GpuStats>> {
        let output = match Command::new(&self.binary)
            .args([
                &format!("--query-gpu={QUERY_FIELDS}"),
                "--format=csv,noheader,nounits",
            ])
            .output()
            .await
        {
            Ok(output) => output,
            Err(error) => {
                debug!(error = %error, "nvidia-smi not available; reporting no GPU");
                return Ok(None);
            }
        };

        if !output.status.success() {
            debug!(status = ?output.status, "nvidia-smi exited non-zero; reporting no GPU");
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().and_then(parse_query_line))
    }
}

/// Parse one CSV line of `nvidia-smi --query-gpu` output. Returns `None`
/// when the line does not carry the expected seven fields.
fn parse_query_line(line: &str) -> Option<GpuStats> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 7 {
        return None;
    }

    // Fields after the name may be "[N/A]" on some boards; treat those as 0.
    let float = |s: &str| s.parse::<f32>().unwrap_or(0.0);
    let mib_to_bytes = |s: &str| s.parse::<u64>().unwrap_or(0) * 1024 * 1024;

    Some(GpuStats {
        name: fields[0].to_string(),
        utilization: float(fields[1]),
        memory_total_bytes: mib_to_bytes(fields[2]),
        memory_used_bytes: mib_to_bytes(fields[3]),
        temperature: float(fields[4]),
        fan_speed: float(fields[5]),
        power_watts: float(fields[6]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_line() {
        let gpu =
            parse_query_line("NVIDIA GeForce RTX 3080, 42, 10240, 3150, 61, 35, 210.57").unwrap();
        assert_eq!(gpu.name, "NVIDIA GeForce RTX 3080");
        assert_eq!(gpu.utilization, 42.0);
        assert_eq!(gpu.memory_total_bytes, 10240 * 1024 * 1024);
        assert_eq!(gpu.memory_used_bytes, 3150 * 1024 * 1024);
        assert_eq!(gpu.temperature, 61.0);
        assert_eq!(gpu.power_watts, 210.57);
    }

    #[test]
    fn test_parse_not_available_fields() {
        let gpu = parse_query_line("Quadro P400, 3, 2048, 512, 45, [N/A], [N/A]").unwrap();
        assert_eq!(gpu.fan_speed, 0.0);
        assert_eq!(gpu.power_watts, 0.0);
    }

    #[test]
    fn test_parse_malformed_line() {
        assert!(parse_query_line("").is_none());
        assert!(parse_query_line("just a name").is_none());
    }
}
