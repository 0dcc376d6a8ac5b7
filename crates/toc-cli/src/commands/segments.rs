//! Segment planning command

use anyhow::{Context, Result};
use toc_gen::plan_segments;

pub fn run(seconds: i64, allowed: &str) -> Result<()> {
    let allowed = allowed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .with_context(|| format!("invalid clip length '{}' in --allowed", s))
        })
        .collect::<Result<Vec<u32>>>()?;

    let plan = plan_segments(seconds, &allowed)?;
    println!("Desired: {}s", seconds);
    println!("Segments: {:?} (total {}s)", plan.segments, plan.total());
    match plan.trim_to {
        Some(trim) => println!("Trim to: {}s", trim),
        None => println!("Trim to: -"),
    }
    Ok(())
}
