use super::read_shells;
use crate::cli::EvaluateArgs;
use crate::error::{CliError, Result};
use qflip::core::io::bvec::{BvecFile, BvecLayout};
use qflip::core::loss::{
    covering_radius, covering_radius_upper_bound, electrostatic_energy, norm_of_mean,
    weighted_cost_multi_shell,
};
use qflip::core::models::scheme::Scheme;
use std::fmt::{self, Write};
use tracing::info;

pub fn run(args: EvaluateArgs) -> Result<()> {
    if args.order < 1 {
        return Err(CliError::Argument(format!(
            "Electrostatic order must be at least 1 (got {})",
            args.order
        )));
    }
    if let Some(w) = args.weight {
        if !(0.0..=1.0).contains(&w) {
            return Err(CliError::Argument(format!(
                "Multi-shell weight must lie in [0, 1] (got {})",
                w
            )));
        }
    }

    let file = BvecFile::new(BvecLayout::from_fslgrad_flag(args.fslgrad));
    let shells = read_shells(&file, &args.input)?;
    info!("Evaluating {} shell(s).", shells.len());

    let report = format_report(&shells, args.order, args.weight)
        .map_err(|e| CliError::Other(e.into()))?;
    print!("{}", report);
    Ok(())
}

fn format_report(
    shells: &[Scheme],
    order: i32,
    weight: Option<f64>,
) -> std::result::Result<String, fmt::Error> {
    let mut report = String::new();

    for (i, shell) in shells.iter().enumerate() {
        let points = shell.directions();
        writeln!(report, "Shell {} ({} directions)", i, shell.len())?;
        writeln!(
            report,
            "  covering radius:            {:.6} rad ({:.3} deg)",
            covering_radius(points, false),
            covering_radius(points, false).to_degrees()
        )?;
        writeln!(
            report,
            "  antipodal covering radius:  {:.6} rad (upper bound {:.6})",
            covering_radius(points, true),
            covering_radius_upper_bound(shell.len())
        )?;
        writeln!(
            report,
            "  electrostatic energy:       {:.6}",
            electrostatic_energy(points, order, false)
        )?;
        writeln!(
            report,
            "  antipodal energy:           {:.6}",
            electrostatic_energy(points, order, true)
        )?;
        writeln!(report, "  norm of mean:               {:.6}", norm_of_mean(points))?;
    }

    if let (true, Some(w)) = (shells.len() > 1, weight) {
        writeln!(report, "Combined (weight {})", w)?;
        writeln!(
            report,
            "  weighted covering radius:   {:.6}",
            weighted_cost_multi_shell(shells, |p| covering_radius(p, false), w)
        )?;
        writeln!(
            report,
            "  weighted energy:            {:.6}",
            weighted_cost_multi_shell(shells, |p| electrostatic_energy(p, order, false), w)
        )?;
    }

    Ok(report)
}
