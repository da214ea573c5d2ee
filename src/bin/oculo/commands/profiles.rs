use crate::cli::ProfilesArgs;
use crate::exit_codes;
use crate::output;
use oculo_rehab::{PhysiologicalProfile, ProfileParams};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileInfo {
    name: String,
    description: &'static str,
    #[serde(flatten)]
    params: ProfileParams,
}

pub fn execute(args: ProfilesArgs) -> i32 {
    let profiles: Vec<ProfileInfo> = PhysiologicalProfile::ALL
        .iter()
        .map(|p| ProfileInfo {
            name: p.to_string(),
            description: p.description(),
            params: p.params(),
        })
        .collect();

    if args.json {
        if let Err(e) = output::print_json(&profiles, false) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        println!("Synthetic Physiological Profiles:\n");
        println!(
            "  {:<8} {:<6} {:<6} {:<7} {:<10} {:<9}",
            "Name", "Head", "Blink", "Jitter", "Asymmetry", "Saccade"
        );
        println!("  {}", "-".repeat(52));
        for p in &profiles {
            println!(
                "  {:<8} {:<6} {:<6} {:<7} {:<10} {:<9}",
                p.name,
                format!("x{}", p.params.head_stability_mult),
                format!("x{}", p.params.blink_rate_mult),
                p.params.gaze_jitter,
                p.params.asymmetry,
                format!("{}ms", p.params.saccade_interval_ms),
            );
        }
        println!();
        for p in &profiles {
            println!("  {:<8} {}", p.name, p.description);
        }
    }

    exit_codes::SUCCESS
}
