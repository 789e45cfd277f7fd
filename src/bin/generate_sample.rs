use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One instrument log as the power meter software exports it.
fn calibration_log(
    date: &str,
    wavelength: u32,
    max_power_mw: f64,
    setpoints: &[u32],
    rng: &mut SimpleRng,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Laser power measurement");
    let _ = writeln!(out, "Date;2025-{date}");
    let _ = writeln!(out, "Laser line;{wavelength} nm");
    let _ = writeln!(out, "Sensor;S170C");
    let _ = writeln!(out);
    let _ = writeln!(out, "Result table values");
    let _ = writeln!(out, "power_instruction;power;error");
    for &pct in setpoints {
        let expected = max_power_mw * pct as f64 / 100.0;
        let measured = expected * rng.gauss(1.0, 0.03);
        let error = measured - expected;
        let _ = writeln!(out, "{pct};{measured:.4};{error:.4}");
    }
    let _ = writeln!(out, "Time;2025-{date} 10:15:00");
    out
}

fn main() -> Result<()> {
    let out_dir = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "sample_logs".to_string()),
    );
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);

    let lasers = [(405, 5.0), (488, 12.0), (561, 9.5), (640, 15.0)];
    let sessions: [(&str, &[u32]); 3] = [
        ("05-12", &[10, 20, 30, 40, 50]),
        ("07-25", &[10, 20, 30, 40, 50, 60]),
        ("08-10", &[20, 30, 40, 50, 60, 80]),
    ];

    let mut written = 0;
    for (date, setpoints) in sessions {
        for (wavelength, max_power) in lasers {
            let text = calibration_log(date, wavelength, max_power, setpoints, &mut rng);
            let path = out_dir.join(format!("{date}_powerscan_{wavelength}.csv"));
            std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
            written += 1;
        }
    }

    println!(
        "Wrote {written} calibration logs ({} dates x {} lasers) to {}",
        sessions.len(),
        lasers.len(),
        out_dir.display()
    );
    Ok(())
}
