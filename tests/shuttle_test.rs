#![cfg(feature = "shuttle")]

mod common;

use shuttle::scheduler::RandomScheduler;
use shuttle::{Config, PortfolioRunner};
use test_log::test;

#[test]
fn three_thread_shuttle_test() {
    let mut portfolio_runner = PortfolioRunner::new(true, Config::new());
    for _ in 0..16 {
        portfolio_runner.add(RandomScheduler::new(10000usize));
    }
    portfolio_runner.run(|| {
        common::futex_mutual_exclusion_test::<3, 20>();
    });
}
