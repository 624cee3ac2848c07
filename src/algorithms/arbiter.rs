// Strategy selection, grading and tie-breaking

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::algorithms::brute_force::BruteForce;
use crate::algorithms::dynamic::SubsetDynamic;
use crate::algorithms::genetic::Genetic;
use crate::algorithms::grader::{Assessment, Grader};
use crate::algorithms::greedy::Greedy;
use crate::algorithms::OptimizationStrategy;
use crate::config::{OptimizerConfig, TieBreakKind, TierThresholds};
use crate::error::SelectionError;
use crate::models::{Batch, Grade, Order, OrderSet};
use crate::oracle::TravelCostOracle;

/// Strategy family chosen from the size of the pending pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    BruteForce,
    DynamicProgramming,
    Genetic,
    Greedy,
}

impl Tier {
    /// Tier for a pool of `pool_size` orders, mandatory order excluded
    pub fn for_pool(pool_size: usize, thresholds: &TierThresholds) -> Self {
        if pool_size < thresholds.brute_force {
            Tier::BruteForce
        } else if pool_size < thresholds.genetic {
            Tier::DynamicProgramming
        } else if pool_size < thresholds.greedy {
            Tier::Genetic
        } else {
            Tier::Greedy
        }
    }
}

/// Decides between two batches that received the same grade
pub trait TieBreakPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `challenger` should replace `incumbent`
    fn challenger_wins(&self, incumbent: &Assessment, challenger: &Assessment) -> bool;
}

/// Higher discount count wins, then shorter total time
///
/// This runs against the grader, which rewards fewer discounts; it is the
/// historical behaviour and stays the default.
pub struct PreferHigherDiscount;

impl TieBreakPolicy for PreferHigherDiscount {
    fn name(&self) -> &'static str {
        "prefer_higher_discount"
    }

    fn challenger_wins(&self, incumbent: &Assessment, challenger: &Assessment) -> bool {
        if challenger.discount_count != incumbent.discount_count {
            challenger.discount_count > incumbent.discount_count
        } else {
            challenger.total_time < incumbent.total_time
        }
    }
}

/// Lower discount count wins, then shorter total time
pub struct PreferLowerDiscount;

impl TieBreakPolicy for PreferLowerDiscount {
    fn name(&self) -> &'static str {
        "prefer_lower_discount"
    }

    fn challenger_wins(&self, incumbent: &Assessment, challenger: &Assessment) -> bool {
        if challenger.discount_count != incumbent.discount_count {
            challenger.discount_count < incumbent.discount_count
        } else {
            challenger.total_time < incumbent.total_time
        }
    }
}

impl From<TieBreakKind> for Box<dyn TieBreakPolicy> {
    fn from(kind: TieBreakKind) -> Self {
        match kind {
            TieBreakKind::PreferHigherDiscount => Box::new(PreferHigherDiscount),
            TieBreakKind::PreferLowerDiscount => Box::new(PreferLowerDiscount),
        }
    }
}

/// Winning batch of one selection cycle
#[derive(Debug, Clone)]
pub struct Selection {
    pub batch: Batch,
    pub assessment: Assessment,
    pub strategy: &'static str,
    pub tier: Tier,
}

/// The two competing strategies of a tier
struct StrategyPair {
    primary: Box<dyn OptimizationStrategy>,
    secondary: Box<dyn OptimizationStrategy>,
}

impl StrategyPair {
    fn new(primary: impl OptimizationStrategy + 'static, secondary: impl OptimizationStrategy + 'static) -> Self {
        Self {
            primary: Box::new(primary),
            secondary: Box::new(secondary),
        }
    }
}

/// Runs the strategies of the tier matching the pool size and keeps the best graded batch
pub struct Arbiter {
    oracle: Arc<TravelCostOracle>,
    thresholds: TierThresholds,
    brute_force: StrategyPair,
    dynamic: StrategyPair,
    genetic: StrategyPair,
    greedy: StrategyPair,
    tie_break: Box<dyn TieBreakPolicy>,
}

impl Arbiter {
    pub fn new(oracle: Arc<TravelCostOracle>, config: &OptimizerConfig) -> Self {
        Self {
            oracle,
            thresholds: config.tiers,
            brute_force: StrategyPair::new(BruteForce::time_oriented(), BruteForce::discount_oriented()),
            dynamic: StrategyPair::new(
                SubsetDynamic::distance_oriented(),
                SubsetDynamic::discount_oriented(),
            ),
            genetic: StrategyPair::new(
                Genetic::discount_oriented(config.genetic),
                Genetic::time_oriented(config.genetic),
            ),
            greedy: StrategyPair::new(Greedy::time_oriented(), Greedy::distance_oriented()),
            tie_break: config.tie_break.into(),
        }
    }

    /// Replaces the tie-break policy
    pub fn with_tie_break(mut self, policy: Box<dyn TieBreakPolicy>) -> Self {
        self.tie_break = policy;
        self
    }

    pub fn oracle(&self) -> &TravelCostOracle {
        &self.oracle
    }

    pub fn tier_for(&self, pool_size: usize) -> Tier {
        Tier::for_pool(pool_size, &self.thresholds)
    }

    fn strategies(&self, tier: Tier) -> &StrategyPair {
        match tier {
            Tier::BruteForce => &self.brute_force,
            Tier::DynamicProgramming => &self.dynamic,
            Tier::Genetic => &self.genetic,
            Tier::Greedy => &self.greedy,
        }
    }

    /// Picks and routes a batch for `mandatory` out of the pending `pool`
    ///
    /// On success the batch orders are removed from `pool`. On failure
    /// `pool` is untouched and the mandatory order stays pending.
    pub fn select_batch(
        &self,
        pool: &mut OrderSet,
        mandatory: Order,
    ) -> Result<(Vec<Order>, Grade), SelectionError> {
        if !pool.contains(mandatory.id()) {
            return Err(SelectionError::MandatoryMissing(mandatory.id()));
        }

        let candidates: Vec<Order> = pool
            .iter()
            .filter(|order| order.id() != mandatory.id())
            .cloned()
            .collect();

        let selection = self.select(&candidates, &mandatory)?;
        for order in selection.batch.orders() {
            pool.remove(order.id());
        }

        Ok((selection.batch.into_orders(), selection.assessment.grade))
    }

    /// Runs both strategies of the tier on `candidates` (mandatory excluded)
    pub fn select(&self, candidates: &[Order], mandatory: &Order) -> Result<Selection, SelectionError> {
        let tier = self.tier_for(candidates.len());
        let pair = self.strategies(tier);
        let grader = Grader::new(&self.oracle);

        let mut reasons = Vec::new();
        let mut best: Option<Selection> = None;

        for strategy in [&pair.primary, &pair.secondary] {
            let batch = match strategy.optimize(candidates, mandatory, &self.oracle) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        criterion = ?strategy.criterion(),
                        error = %e,
                        "strategy skipped this cycle"
                    );
                    reasons.push(format!("{}: {}", strategy.name(), e));
                    continue;
                }
            };

            let assessment = grader.assess(batch.orders());
            debug!(
                strategy = strategy.name(),
                criterion = ?strategy.criterion(),
                grade = assessment.grade,
                total_time = assessment.total_time,
                discounts = assessment.discount_count,
                orders = ?batch.ids(),
                "strategy result"
            );

            let challenger = Selection {
                batch,
                assessment,
                strategy: strategy.name(),
                tier,
            };

            best = match best {
                None => Some(challenger),
                Some(incumbent) => Some(self.resolve(incumbent, challenger)),
            };
        }

        let selection = best.ok_or(SelectionError::NoCandidate {
            mandatory: mandatory.id(),
            reasons,
        })?;
        info!(
            ?tier,
            strategy = selection.strategy,
            grade = selection.assessment.grade,
            orders = ?selection.batch.ids(),
            "batch selected"
        );
        Ok(selection)
    }

    fn resolve(&self, incumbent: Selection, challenger: Selection) -> Selection {
        let (a, b) = (&incumbent.assessment, &challenger.assessment);
        let challenger_wins = if a.grade == b.grade {
            let wins = self.tie_break.challenger_wins(a, b);
            debug!(policy = self.tie_break.name(), challenger_wins = wins, "grades tied");
            wins
        } else {
            b.grade > a.grade
        };

        if challenger_wins {
            challenger
        } else {
            incumbent
        }
    }
}
