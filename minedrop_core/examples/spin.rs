use minedrop_core::{Credits, Engine, EngineParams};

fn main() {
    // Example end-to-end session: a few rounds, then an audit of the last one
    let server_seed = "example-server-seed";
    let client_seed = "example-client-seed";
    let engine = Engine::new(EngineParams::default()).expect("default params are valid");
    let mut state = engine
        .new_session(server_seed, client_seed)
        .expect("seeds are well formed");
    println!("server_seed_hash={}", state.server_seed_hash);

    let bet = Credits::whole(1);
    for _ in 0..5 {
        let grid_before = state.grid.clone();
        let bonus_before = state.bonus.active;
        let outcome = engine.spin(&mut state, bet).expect("balance covers the bet");
        for column in &outcome.columns {
            println!(
                "  nonce={} col={} power={} destroyed={} chest={:?} payout={}",
                outcome.nonce,
                column.x,
                column.power,
                column.destroyed_count(),
                column.chest,
                column.payout
            );
        }
        println!(
            "nonce={} payout={} tier={:?} balance={} bonus_triggered={}",
            outcome.nonce,
            outcome.total_payout,
            outcome.win_tier,
            outcome.balance_after,
            outcome.bonus_triggered
        );

        let replay = engine
            .verify_round(server_seed, client_seed, outcome.nonce, bet, bonus_before, &grid_before)
            .expect("seeds are well formed");
        assert!(replay.agrees_with(&outcome));
        assert_eq!(replay.next_grid, state.grid);
    }
}
