//! Seeded synthetic credit records
//!
//! Used when no real dataset can be reached. The columns follow the canonical
//! schema but carry no predictive signal.

use crate::error::Result;
use polars::prelude::*;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

use super::schema::TARGET_COLUMN;

pub const DEFAULT_ROWS: usize = 1000;
pub const DEFAULT_SEED: u64 = 42;

/// Generator for schema-conformant random records
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    n_rows: usize,
    seed: u64,
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS)
    }
}

impl SyntheticGenerator {
    pub fn new(n_rows: usize) -> Self {
        Self {
            n_rows,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Generate a canonical frame (all columns Float64).
    pub fn generate(&self) -> Result<DataFrame> {
        let n = self.n_rows;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);

        let mut columns: Vec<(String, Vec<f64>)> = Vec::with_capacity(24);
        columns.push(("limit_bal".into(), uniform_int(&mut rng, n, 10_000, 1_000_000)));
        columns.push(("sex".into(), choice(&mut rng, n, &[1.0, 2.0])));
        columns.push(("education".into(), choice(&mut rng, n, &[1.0, 2.0, 3.0, 4.0])));
        columns.push(("marriage".into(), choice(&mut rng, n, &[1.0, 2.0, 3.0])));
        columns.push(("age".into(), uniform_int(&mut rng, n, 21, 79)));

        let mut pay = Vec::with_capacity(6);
        let mut bill = Vec::with_capacity(6);
        let mut paid = Vec::with_capacity(6);
        for i in 1..=6 {
            pay.push((format!("pay_{}", i), uniform_int(&mut rng, n, -2, 9)));
            bill.push((format!("bill_amt{}", i), normal(&mut rng, n, 50_000.0, 50_000.0)));
            paid.push((format!("pay_amt{}", i), normal(&mut rng, n, 2_000.0, 5_000.0)));
        }
        columns.extend(pay);
        columns.extend(bill);
        columns.extend(paid);
        columns.push((TARGET_COLUMN.into(), uniform_int(&mut rng, n, 0, 2)));

        let columns: Vec<Column> = columns
            .into_iter()
            .map(|(name, values)| Column::new(name.into(), values))
            .collect();

        Ok(DataFrame::new(columns)?)
    }
}

/// Integers drawn uniformly from `[low, high)`
fn uniform_int(rng: &mut Xoshiro256PlusPlus, n: usize, low: i64, high: i64) -> Vec<f64> {
    (0..n).map(|_| rng.gen_range(low..high) as f64).collect()
}

fn choice(rng: &mut Xoshiro256PlusPlus, n: usize, options: &[f64]) -> Vec<f64> {
    (0..n).map(|_| options[rng.gen_range(0..options.len())]).collect()
}

fn normal(rng: &mut Xoshiro256PlusPlus, n: usize, mean: f64, scale: f64) -> Vec<f64> {
    (0..n).map(|_| mean + scale * standard_normal(rng)).collect()
}

/// Box-Muller transform
fn standard_normal(rng: &mut Xoshiro256PlusPlus) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
