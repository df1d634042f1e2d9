//! The power market shared by all players in a match.
//!
//! Each timestep, players bid the power they produced at a price of their choosing. Bids are
//! cleared in merit order: the cheapest bids are accepted first until demand is met.
use crate::game::PlayerID;
use crate::model::MarketParameters;
use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Conversion from a price per kWh and a volume in MWh to earnings
const KWH_PER_MWH: f64 = 1000.0;

/// A player's offer to sell power
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bid {
    /// Price per kWh
    pub price: f64,
    /// Volume of power (MWh)
    pub volume: f64,
}

/// A bid after the market has been cleared
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptedBid {
    /// The player who made the bid
    pub player_id: PlayerID,
    /// Cash earned from the sale
    pub earnings: f64,
    /// Volume of power sold (MWh), which may be less than the volume bid
    pub volume: f64,
}

/// What a player earned from the last clearing of the market
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ProductionResult {
    /// Cash earned from the sale
    pub earnings: f64,
    /// Volume of power sold (MWh)
    pub volume: f64,
}

/// A merit-order power market
#[derive(Debug, Clone)]
pub struct PowerMarket {
    parameters: MarketParameters,
    demand: Arc<[f64]>,
    n_players: usize,
    timestep: usize,
    bids: IndexMap<PlayerID, Bid>,
    accepted_bids: Vec<AcceptedBid>,
    results: HashMap<PlayerID, ProductionResult>,
    clearing_price: f64,
    rng: ChaCha8Rng,
}

impl PowerMarket {
    /// Create a new market with no players.
    ///
    /// # Arguments
    ///
    /// * `demand` - Demand per player for each timestep
    /// * `parameters` - Market parameters. If no seed is given, the random number generator used
    ///   for breaking ties is seeded from entropy.
    pub fn new(demand: Arc<[f64]>, parameters: MarketParameters) -> Self {
        let rng = match parameters.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            parameters,
            demand,
            n_players: 0,
            timestep: 0,
            bids: IndexMap::new(),
            accepted_bids: Vec::new(),
            results: HashMap::new(),
            clearing_price: 0.0,
            rng,
        }
    }

    /// Register a new player, which increases demand
    pub fn add_player(&mut self) {
        self.n_players += 1;
    }

    /// The number of players taking part
    pub fn n_players(&self) -> usize {
        self.n_players
    }

    /// The market's current timestep
    pub fn timestep(&self) -> usize {
        self.timestep
    }

    /// Move on to the next timestep
    pub fn advance(&mut self) {
        self.timestep += 1;
    }

    /// Demand for power in the current timestep (MWh).
    ///
    /// Demand is zero once the demand series has been exhausted.
    pub fn production_demand(&self) -> f64 {
        let Some(demand) = self.demand.get(self.timestep) else {
            return 0.0;
        };

        demand
            * self.n_players as f64
            * self.parameters.player_scale_factor
            * self.parameters.demand_factor
    }

    /// Place a bid on behalf of a player, replacing any bid they have already placed this timestep.
    ///
    /// The price is clamped to the market's price limits and negative volumes are treated as zero.
    pub fn add_player_bid(&mut self, player_id: PlayerID, volume: f64, price: f64) {
        let price = if price.is_nan() {
            self.parameters.min_price
        } else {
            price.clamp(self.parameters.min_price, self.parameters.max_price)
        };

        self.bids.insert(
            player_id,
            Bid {
                price,
                volume: volume.max(0.0),
            },
        );
    }

    /// Bids placed so far in this timestep
    pub fn pending_bids(&self) -> &IndexMap<PlayerID, Bid> {
        &self.bids
    }

    /// Clear the market.
    ///
    /// Each bid is perturbed by a small random amount so that bids with equal prices are accepted in
    /// a random order. Bids are then accepted cheapest first until demand is met, with the last
    /// accepted bid possibly only partly filled. Earnings are calculated from the price which was
    /// bid, without the perturbation.
    ///
    /// All pending bids are consumed.
    ///
    /// # Returns
    ///
    /// The average price paid for power, or zero if no power was sold.
    pub fn process_bids(&mut self) -> f64 {
        let demand = self.production_demand();
        let epsilon = self.parameters.tie_break_epsilon;
        let rng = &mut self.rng;
        let mut merit_order = self
            .bids
            .drain(..)
            .map(|(player_id, bid)| {
                let perturbed_price = bid.price + epsilon * rng.gen_range(0.0..1.0);
                (perturbed_price, player_id, bid)
            })
            .collect_vec();

        if let Some(import) = &self.parameters.import {
            let bid = Bid {
                price: import.price,
                volume: f64::INFINITY,
            };
            merit_order.push((import.price, import.player_id.clone(), bid));
        }

        merit_order.sort_by(|(a, _, _), (b, _, _)| a.total_cmp(b));

        self.accepted_bids.clear();
        self.results.clear();
        let mut total_production = 0.0;
        let mut total_revenue = 0.0;
        for (_, player_id, bid) in merit_order {
            let volume = bid.volume.min((demand - total_production).max(0.0));
            let earnings = volume * bid.price * KWH_PER_MWH;
            total_production += volume;
            total_revenue += earnings;

            self.results
                .insert(player_id.clone(), ProductionResult { earnings, volume });
            self.accepted_bids.push(AcceptedBid {
                player_id,
                earnings,
                volume,
            });
        }

        self.clearing_price = if total_production > 0.0 {
            total_revenue / total_production
        } else {
            0.0
        };
        debug!(
            "Market cleared at timestep {}: {total_production} of {demand} MWh sold at an average \
             price of {}",
            self.timestep, self.clearing_price
        );

        self.clearing_price
    }

    /// All bids from the last clearing, in merit order
    pub fn accepted_bids(&self) -> &[AcceptedBid] {
        &self.accepted_bids
    }

    /// What a player earned from the last clearing (zero if they didn't bid)
    pub fn result_for(&self, player_id: &str) -> ProductionResult {
        self.results.get(player_id).copied().unwrap_or_default()
    }

    /// Average price paid for power at the last clearing
    pub fn clearing_price(&self) -> f64 {
        self.clearing_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImportParameters;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    fn market_parameters(seed: u64) -> MarketParameters {
        MarketParameters {
            demand_factor: 1.0,
            player_scale_factor: 1.0,
            seed: Some(seed),
            ..MarketParameters::default()
        }
    }

    /// A market with two players and a demand of 12 MWh in the first timestep
    #[fixture]
    fn market() -> PowerMarket {
        let mut market = PowerMarket::new(Arc::from(vec![6.0, 0.0]), market_parameters(1));
        market.add_player();
        market.add_player();
        market
    }

    #[rstest]
    fn test_production_demand(mut market: PowerMarket) {
        assert_eq!(market.production_demand(), 12.0);
        market.advance();
        assert_eq!(market.production_demand(), 0.0);

        // Demand series has been exhausted
        market.advance();
        assert_eq!(market.production_demand(), 0.0);
    }

    #[test]
    fn test_production_demand_scaling() {
        let mut market = PowerMarket::new(Arc::from(vec![0.5]), MarketParameters::default());
        market.add_player();
        market.add_player();
        market.add_player();
        assert_approx_eq!(f64, market.production_demand(), 0.5 * 3.0 * 0.8 * 1200.0);
    }

    #[rstest]
    fn test_merit_order(mut market: PowerMarket) {
        market.add_player_bid("A".into(), 10.0, 2.0);
        market.add_player_bid("B".into(), 5.0, 1.0);
        let clearing_price = market.process_bids();

        assert_eq!(
            market.accepted_bids(),
            [
                AcceptedBid {
                    player_id: "B".into(),
                    earnings: 5000.0,
                    volume: 5.0
                },
                AcceptedBid {
                    player_id: "A".into(),
                    earnings: 14_000.0,
                    volume: 7.0
                }
            ]
        );
        let total_volume: f64 = market.accepted_bids().iter().map(|bid| bid.volume).sum();
        assert_eq!(total_volume, 12.0);
        assert_approx_eq!(f64, clearing_price, 19_000.0 / 12.0);
        assert_eq!(
            market.result_for("A"),
            ProductionResult {
                earnings: 14_000.0,
                volume: 7.0
            }
        );
    }

    #[rstest]
    fn test_supply_below_demand(mut market: PowerMarket) {
        market.add_player_bid("A".into(), 4.0, 2.0);
        market.add_player_bid("B".into(), 5.0, 1.0);
        market.process_bids();
        assert_eq!(market.result_for("A").volume, 4.0);
        assert_eq!(market.result_for("B").volume, 5.0);
    }

    #[rstest]
    fn test_zero_demand(mut market: PowerMarket) {
        market.advance();
        market.add_player_bid("A".into(), 10.0, 2.0);
        market.add_player_bid("B".into(), 5.0, 1.0);
        assert_eq!(market.process_bids(), 0.0);
        assert!(market.accepted_bids().iter().all(|bid| bid.volume == 0.0));
        assert!(market.accepted_bids().iter().all(|bid| bid.earnings == 0.0));
    }

    #[rstest]
    #[case(-1.0, 1e-6)]
    #[case(0.0, 1e-6)]
    #[case(f64::NAN, 1e-6)]
    #[case(0.5, 0.5)]
    #[case(1e9, 100.0)]
    fn test_price_clamped(mut market: PowerMarket, #[case] price: f64, #[case] expected: f64) {
        market.add_player_bid("A".into(), 1.0, price);
        assert_eq!(market.pending_bids()["A"].price, expected);
    }

    #[rstest]
    fn test_negative_volume(mut market: PowerMarket) {
        market.add_player_bid("A".into(), -3.0, 1.0);
        assert_eq!(market.pending_bids()["A"].volume, 0.0);
    }

    #[rstest]
    fn test_bid_replaced(mut market: PowerMarket) {
        market.add_player_bid("A".into(), 10.0, 2.0);
        market.add_player_bid("A".into(), 3.0, 1.0);
        assert_eq!(
            market.pending_bids()["A"],
            Bid {
                price: 1.0,
                volume: 3.0
            }
        );
    }

    #[rstest]
    fn test_bids_are_read_once(mut market: PowerMarket) {
        market.add_player_bid("A".into(), 10.0, 2.0);
        market.process_bids();
        assert!(market.pending_bids().is_empty());

        market.process_bids();
        assert!(market.accepted_bids().is_empty());
        assert_eq!(market.result_for("A"), ProductionResult::default());
        assert_eq!(market.clearing_price(), 0.0);
    }

    #[test]
    fn test_ties_broken_randomly() {
        let mut winners = Vec::new();
        for seed in 0..50 {
            let mut market = PowerMarket::new(Arc::from(vec![5.0]), market_parameters(seed));
            market.add_player();
            market.add_player();
            market.add_player_bid("A".into(), 10.0, 1.0);
            market.add_player_bid("B".into(), 10.0, 1.0);
            market.process_bids();

            // Whoever is first sells everything, at the price they bid
            let first = &market.accepted_bids()[0];
            assert_eq!(first.volume, 10.0);
            assert_eq!(first.earnings, 10_000.0);
            winners.push(first.player_id.clone());
        }

        assert!(winners.contains(&"A".into()));
        assert!(winners.contains(&"B".into()));
    }

    #[test]
    fn test_same_seed_same_result() {
        let run = || {
            let mut market = PowerMarket::new(Arc::from(vec![5.0]), market_parameters(7));
            market.add_player();
            market.add_player();
            market.add_player_bid("A".into(), 10.0, 1.0);
            market.add_player_bid("B".into(), 10.0, 1.0);
            market.process_bids();
            market.accepted_bids().to_vec()
        };

        assert_eq!(run(), run());
    }

    #[rstest]
    fn test_import_fills_remaining_demand(mut market: PowerMarket) {
        market.parameters.import = Some(ImportParameters {
            player_id: "import".into(),
            price: 5.0,
        });
        market.add_player_bid("A".into(), 5.0, 1.0);
        market.add_player_bid("B".into(), 5.0, 10.0);
        market.process_bids();

        assert_eq!(market.result_for("A").volume, 5.0);
        assert_eq!(
            market.result_for("import"),
            ProductionResult {
                earnings: 35_000.0,
                volume: 7.0
            }
        );
        assert_eq!(market.result_for("B").volume, 0.0);
    }
}
