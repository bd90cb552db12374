use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Apollo3 is a Cortex-M4F
const TARGET: &str = "thumbv7em-none-eabihf";

/// One rustdoc pass over the driver
struct DocPass {
    label: &'static str,
    target: Option<&'static str>,
    feature: &'static str,
}

/// Host docs carry the `tracing` build; embedded docs the `defmt` build, so
/// feature-gated derives and log macros are rendered for both.
const PASSES: [DocPass; 2] = [
    DocPass {
        label: "host (tracing)",
        target: None,
        feature: "tracing",
    },
    DocPass {
        label: "embedded (defmt)",
        target: Some(TARGET),
        feature: "defmt",
    },
];

fn build(pass: &DocPass, private: bool, open: bool) -> Result<()> {
    println!("{}", format!("  Documenting {}...", pass.label).cyan());
    let start = Instant::now();

    let mut cmd = Command::new("cargo");
    cmd.args(["doc", "-p", "io-slave", "--no-deps", "--features", pass.feature]);
    if let Some(target) = pass.target {
        cmd.args(["--target", target]);
    }
    if private {
        cmd.arg("--document-private-items");
    }
    if open {
        cmd.arg("--open");
    }
    // Broken intra-doc links to registers and requests fail the build.
    cmd.env("RUSTDOCFLAGS", "-D warnings");

    let output = cmd
        .output()
        .with_context(|| format!("Failed to document {}", pass.label))?;

    if !output.status.success() {
        eprintln!("{}", format!("  ✗ {} docs failed", pass.label).red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("{} documentation failed", pass.label);
    }

    println!(
        "{}",
        format!(
            "  ✓ {} documented in {:.2}s",
            pass.label,
            start.elapsed().as_secs_f64()
        )
        .green()
    );
    Ok(())
}

pub fn run(open: bool, private: bool) -> Result<()> {
    println!();
    println!("{}", "📚 Documenting io-slave...".cyan().bold());
    println!();

    // Only the host pass is opened.
    for (i, pass) in PASSES.iter().enumerate() {
        build(pass, private, open && i == 0)?;
    }

    println!();
    if !open {
        println!(
            "   {}",
            format!("Host docs: target/doc/io_slave/index.html, embedded: target/{TARGET}/doc/io_slave/index.html")
                .dimmed()
        );
        println!();
    }

    Ok(())
}
