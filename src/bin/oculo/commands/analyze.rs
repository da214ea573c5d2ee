use crate::cli::{self, AnalyzeArgs};
use crate::exit_codes;
use crate::output;
use oculo_rehab::analysis::{self, MeasuredInputs};

pub fn execute(args: AnalyzeArgs) -> i32 {
    let kind = match cli::parse_exercise(&args.exercise) {
        Ok(k) => k,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if !args.elapsed.is_finite() || args.elapsed < 0.0 {
        eprintln!("Error: --elapsed must be a non-negative number of seconds");
        return exit_codes::INPUT_ERROR;
    }
    if !(0.0..=100.0).contains(&args.stability) {
        eprintln!("Error: --stability must be between 0 and 100");
        return exit_codes::INPUT_ERROR;
    }
    if !args.score.is_finite() || args.score < 0.0 {
        eprintln!("Error: --score must be a non-negative number");
        return exit_codes::INPUT_ERROR;
    }

    let inputs = MeasuredInputs {
        elapsed_seconds: args.elapsed,
        score: args.score,
        blink_count: args.blinks,
        head_stability_score: args.stability,
    };
    let result = analysis::measured(kind, args.elapsed.round() as u32, inputs);

    if args.json {
        if let Err(e) = output::print_json(&result, false) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        println!("{}", kind.title());
        println!(
            "  Value:  {} {}",
            result.clinical_value, result.clinical_unit
        );
        println!("  Status: {:?}", result.status);
        println!("  {}", result.recommendation);
        for note in &result.notes {
            println!("  - {}", note);
        }
    }

    exit_codes::SUCCESS
}
