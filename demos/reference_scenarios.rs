//! Run the reference profiles through the engine and print one line each

fn main() {
    for scenario in w_heart::scenarios::reference_scenarios() {
        let output = w_heart::evaluate(&scenario.input);
        println!(
            "{:<28} risk={:<9} N_vasc={:>5}/{:<5} {}",
            scenario.name, output.risk, output.n_vasc, output.n_crit, output.phase
        );
    }
}
