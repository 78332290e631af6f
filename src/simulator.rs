//! Balance simulator for the krakenling economy.
//! Run with: cargo test -p krakenling-economy simulate_greedy -- --nocapture
