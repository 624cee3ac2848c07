// Genetic algorithm over five-order individuals

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::algorithms::{check_pool, Criterion, OptimizationStrategy, RouteScore, COMPANIONS};
use crate::config::GeneticParams;
use crate::error::StrategyError;
use crate::models::{Batch, Order, RouteMetrics};
use crate::oracle::TravelCostOracle;

/// Parent pairs crossed at each generation, by rank in the sorted population
const CROSSOVER_PAIRS: [(usize, usize); 4] = [(0, 1), (0, 2), (1, 2), (0, 3)];

type Individual = Vec<Order>;

/// Evolves batches whose first gene is always the mandatory order
///
/// Each generation keeps the fittest individual, adds four crossover
/// children of the top four, mutates all five and refills the population
/// with random individuals.
pub struct Genetic {
    criterion: Criterion,
    population_size: usize,
    generations: usize,
    seed: Option<u64>,
}

impl Genetic {
    /// Fitness: fewer discounts, then shorter total time
    pub fn discount_oriented(params: GeneticParams) -> Self {
        Self::with_criterion(Criterion::Discount, params)
    }

    /// Fitness: shorter total time, then fewer discounts
    pub fn time_oriented(params: GeneticParams) -> Self {
        Self::with_criterion(Criterion::Time, params)
    }

    fn with_criterion(criterion: Criterion, params: GeneticParams) -> Self {
        Self {
            criterion,
            population_size: params.population_size.max(CROSSOVER_PAIRS.len() + 1),
            generations: params.generations,
            seed: params.seed,
        }
    }

    fn random_individual(pool: &[Order], mandatory: &Order, rng: &mut StdRng) -> Individual {
        let mut individual = Vec::with_capacity(COMPANIONS + 1);
        individual.push(mandatory.clone());
        individual.extend(pool.choose_multiple(rng, COMPANIONS).cloned());
        individual
    }

    /// Sorts fittest first
    fn rank(&self, population: Vec<Individual>, metrics: &RouteMetrics<'_>) -> Vec<Individual> {
        let mut scored: Vec<(RouteScore, Individual)> = population
            .into_iter()
            .map(|individual| (self.criterion.score(metrics, &individual), individual))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.into_iter().map(|(_, individual)| individual).collect()
    }

    fn next_generation(
        &self,
        population: &[Individual],
        pool: &[Order],
        mandatory: &Order,
        rng: &mut StdRng,
    ) -> Vec<Individual> {
        let mut next = Vec::with_capacity(self.population_size);
        next.push(population[0].clone());
        for (first, second) in CROSSOVER_PAIRS {
            next.push(crossover(&population[first], &population[second], rng));
        }

        for individual in next.iter_mut() {
            mutate(individual, rng);
        }

        while next.len() < self.population_size {
            next.push(Self::random_individual(pool, mandatory, rng));
        }
        next
    }
}

/// Child inherits gene 0 from `parent1`, then each gene from a random parent
fn crossover(parent1: &[Order], parent2: &[Order], rng: &mut StdRng) -> Individual {
    let mut child = Vec::with_capacity(parent1.len());
    child.push(parent1[0].clone());

    for i in 1..parent1.len() {
        if rng.gen_bool(0.5) {
            add_gene(&mut child, &parent1[i], parent2);
        } else {
            add_gene(&mut child, &parent2[i], parent1);
        }
    }
    child
}

/// Adds `gene`, or the first gene of `other_parent` not yet in `child`
fn add_gene(child: &mut Individual, gene: &Order, other_parent: &[Order]) {
    if !child.contains(gene) {
        child.push(gene.clone());
    } else if let Some(alternative) = other_parent.iter().find(|order| !child.contains(order)) {
        child.push(alternative.clone());
    }
}

/// Swaps two distinct genes, never the mandatory one
fn mutate(individual: &mut Individual, rng: &mut StdRng) {
    if individual.len() < 3 {
        return;
    }
    let first = rng.gen_range(1..individual.len());
    let mut second = rng.gen_range(1..individual.len());
    while second == first {
        second = rng.gen_range(1..individual.len());
    }
    individual.swap(first, second);
}

impl OptimizationStrategy for Genetic {
    fn name(&self) -> &'static str {
        match self.criterion {
            Criterion::Discount => "genetic_discount",
            Criterion::Time => "genetic_time",
            Criterion::Distance => "genetic_distance",
        }
    }

    fn criterion(&self) -> Criterion {
        self.criterion
    }

    fn optimize(
        &self,
        pool: &[Order],
        mandatory: &Order,
        oracle: &TravelCostOracle,
    ) -> Result<Batch, StrategyError> {
        check_pool(pool, mandatory, COMPANIONS)?;

        let metrics = RouteMetrics::new(oracle);
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let initial = (0..self.population_size)
            .map(|_| Self::random_individual(pool, mandatory, &mut rng))
            .collect();
        let mut population = self.rank(initial, &metrics);

        for _ in 0..self.generations {
            let next = self.next_generation(&population, pool, mandatory, &mut rng);
            population = self.rank(next, &metrics);
        }

        let fittest = population.swap_remove(0);
        debug!(
            strategy = self.name(),
            generations = self.generations,
            score = ?self.criterion.score(&metrics, &fittest),
            "evolution finished"
        );

        Batch::new(fittest, mandatory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, OrderId};
    use chrono::Utc;
    use std::collections::HashSet;

    fn order(id: OrderId, lat: f64, lon: f64) -> Order {
        Order::new(id, GeoPoint::new(lat, lon), Utc::now())
    }

    fn pool(n: u64) -> Vec<Order> {
        (1..=n)
            .map(|i| order(i, 48.62 + (i % 7) as f64 * 0.025, 1.99 + (i % 5) as f64 * 0.05))
            .collect()
    }

    fn params(seed: u64) -> GeneticParams {
        GeneticParams {
            population_size: 10,
            generations: 100,
            seed: Some(seed),
        }
    }

    #[test]
    fn test_crossover_keeps_genes_distinct() {
        let mut rng = StdRng::seed_from_u64(7);
        let orders = pool(8);
        let mandatory = order(0, 48.7, 2.1);

        for _ in 0..50 {
            let p1 = Genetic::random_individual(&orders, &mandatory, &mut rng);
            let p2 = Genetic::random_individual(&orders, &mandatory, &mut rng);
            let child = crossover(&p1, &p2, &mut rng);

            assert_eq!(child.len(), 5);
            assert_eq!(child[0], mandatory);
            let ids: HashSet<OrderId> = child.iter().map(Order::id).collect();
            assert_eq!(ids.len(), 5);
        }
    }

    #[test]
    fn test_mutation_never_moves_mandatory() {
        let mut rng = StdRng::seed_from_u64(3);
        let mandatory = order(0, 48.7, 2.1);
        let mut individual = vec![mandatory.clone()];
        individual.extend(pool(4));

        for _ in 0..50 {
            let before: HashSet<OrderId> = individual.iter().map(Order::id).collect();
            mutate(&mut individual, &mut rng);
            let after: HashSet<OrderId> = individual.iter().map(Order::id).collect();
            assert_eq!(individual[0], mandatory);
            assert_eq!(before, after);
        }
    }

    #[test]
    fn test_genetic_batch_is_valid() {
        let oracle = TravelCostOracle::geometric(GeoPoint::new(48.7117, 2.1657));
        let mandatory = order(0, 48.7, 2.1);
        let orders = pool(25);

        for strategy in [
            Genetic::discount_oriented(params(11)),
            Genetic::time_oriented(params(11)),
        ] {
            let batch = strategy.optimize(&orders, &mandatory, &oracle).unwrap();
            assert_eq!(batch.len(), 5);
            assert_eq!(batch.orders()[0], mandatory);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let oracle = TravelCostOracle::geometric(GeoPoint::new(48.7117, 2.1657));
        let mandatory = order(0, 48.7, 2.1);
        let orders = pool(30);

        let first = Genetic::discount_oriented(params(5))
            .optimize(&orders, &mandatory, &oracle)
            .unwrap();
        let second = Genetic::discount_oriented(params(5))
            .optimize(&orders, &mandatory, &oracle)
            .unwrap();
        assert_eq!(first.ids(), second.ids());
    }

    #[test]
    fn test_genetic_requires_four_orders() {
        let oracle = TravelCostOracle::geometric(GeoPoint::new(48.7117, 2.1657));
        let mandatory = order(0, 48.7, 2.1);

        assert!(matches!(
            Genetic::time_oriented(params(1)).optimize(&pool(2), &mandatory, &oracle),
            Err(StrategyError::InsufficientOrders { .. })
        ));
    }
}
