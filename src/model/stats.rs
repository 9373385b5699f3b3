/// Row counters collected while importing and reconciling.
#[derive(Debug, Default)]
pub struct Stats {
    n_coinbase_rows: i32,
    n_robinhood_rows: i32,
    n_strike_rows: i32,
    n_manual_rows: i32,
    n_carried_lots: i32,
    n_dropped_by_year: i32,
    n_buys: i32,
    n_sells: i32,
}

impl Stats {
    pub fn add_coinbase(&mut self, n: usize) {
        self.n_coinbase_rows += count(n);
    }

    pub fn add_robinhood(&mut self, n: usize) {
        self.n_robinhood_rows += count(n);
    }

    pub fn add_strike(&mut self, n: usize) {
        self.n_strike_rows += count(n);
    }

    pub fn add_manual(&mut self, n: usize) {
        self.n_manual_rows += count(n);
    }

    pub fn add_carried(&mut self, n: usize) {
        self.n_carried_lots += count(n);
    }

    pub fn add_dropped(&mut self, n: usize) {
        self.n_dropped_by_year += count(n);
    }

    pub fn inc_buys(&mut self) {
        self.n_buys += 1;
    }

    pub fn inc_sells(&mut self) {
        self.n_sells += 1;
    }

    pub fn pretty_print(&self) {
        println!("{self:#?}");
        println!();
    }
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
