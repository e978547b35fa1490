// src/partition/planner.rs

//! Chooses which filter dimension to narrow when a query overflows.

use std::sync::Arc;

use crate::models::{Dimension, FilterSet, Interval, PartitionConfig, Query};

use super::splitter::split;

/// What to do with a query whose results overflow the page window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Probe these narrower queries instead
    Split {
        dimension: Dimension,
        children: Vec<Query>,
    },
    /// Every dimension is at its granularity floor
    Unsplittable,
}

/// One transition of the planning loop.
#[derive(Debug, Clone, Copy)]
enum Step {
    /// Impose the dimension's default range, then narrow it
    Broaden(Dimension),
    /// Narrow an already constrained dimension
    Narrow(Dimension, Interval),
}

/// Partition planner over a fixed dimension priority (price, area, year).
#[derive(Debug, Clone)]
pub struct PartitionPlanner {
    config: Arc<PartitionConfig>,
}

impl PartitionPlanner {
    pub fn new(config: Arc<PartitionConfig>) -> Self {
        Self { config }
    }

    /// Plan the children of an overflowing query.
    ///
    /// Dimensions are visited in priority order on every call. An
    /// unconstrained dimension is broadened to its default range and split;
    /// a constrained one is split as is. Only dimensions already at their
    /// granularity floor are passed over, so the query is unsplittable once
    /// all three are minimal.
    pub fn plan(&self, query: &Query) -> Plan {
        let mut filters = query.filters;

        for dimension in Dimension::PRIORITY {
            let interval = match Self::step(&filters, dimension) {
                Step::Broaden(dimension) => {
                    let rules = self.config.rules(dimension);
                    let interval = Interval::new(rules.default_min, rules.default_max);
                    filters = filters.with(dimension, interval);
                    interval
                }
                Step::Narrow(_, interval) => interval,
            };

            let parts = split(self.config.rules(dimension), interval.min, interval.max);
            if parts.len() > 1 {
                let children = parts
                    .into_iter()
                    .map(|part| query.with_filters(filters.with(dimension, part)))
                    .collect();
                return Plan::Split {
                    dimension,
                    children,
                };
            }
        }

        Plan::Unsplittable
    }

    fn step(filters: &FilterSet, dimension: Dimension) -> Step {
        match filters.get(dimension) {
            Some(interval) => Step::Narrow(dimension, interval),
            None => Step::Broaden(dimension),
        }
    }
}
