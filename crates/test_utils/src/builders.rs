//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults.
//! Tests specify only the relevant fields and take defaults for the rest.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeSet, HashMap};

use core_kernel::{Currency, Money};
use domain_coverage::{ItemType, LineItem};
use domain_policy::{CoverageTier, PolicyContext};

/// Builder for estimate line items
pub struct LineItemBuilder {
    description: String,
    item_type: ItemType,
    total_price: Decimal,
    part_code: Option<String>,
}

impl LineItemBuilder {
    pub fn parts(description: impl Into<String>, total_price: Decimal) -> Self {
        Self {
            description: description.into(),
            item_type: ItemType::Parts,
            total_price,
            part_code: None,
        }
    }

    pub fn labor(description: impl Into<String>, total_price: Decimal) -> Self {
        Self {
            description: description.into(),
            item_type: ItemType::Labor,
            total_price,
            part_code: None,
        }
    }

    pub fn fee(description: impl Into<String>, total_price: Decimal) -> Self {
        Self {
            description: description.into(),
            item_type: ItemType::Fee,
            total_price,
            part_code: None,
        }
    }

    pub fn with_part_code(mut self, code: impl Into<String>) -> Self {
        self.part_code = Some(code.into());
        self
    }

    pub fn build(self) -> LineItem {
        LineItem::new(
            self.description,
            self.item_type,
            self.total_price,
            self.part_code,
        )
    }
}

/// Builder for policy contexts
///
/// Defaults describe a mid-mileage vehicle on a policy covering the engine
/// category with the fixture components.
pub struct PolicyContextBuilder {
    covered_categories: BTreeSet<String>,
    covered_components: HashMap<String, Vec<String>>,
    excluded_components: Vec<String>,
    coverage_scale: Vec<CoverageTier>,
    age_threshold_years: Option<u32>,
    max_coverage: Money,
    excess_percent: Decimal,
    excess_minimum: Money,
    vat_rate: Decimal,
    vehicle_km: u32,
    vehicle_age_years: u32,
    policyholder_name: Option<String>,
}

impl Default for PolicyContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyContextBuilder {
    pub fn new() -> Self {
        Self {
            covered_categories: BTreeSet::from(["engine".to_string()]),
            covered_components: HashMap::from([(
                "engine".to_string(),
                vec![
                    "oil_cooler".to_string(),
                    "egr_valve".to_string(),
                    "water_pump".to_string(),
                ],
            )]),
            excluded_components: Vec::new(),
            coverage_scale: vec![
                CoverageTier {
                    km_threshold: 50_000,
                    coverage_percent: dec!(80),
                    age_coverage_percent: Some(dec!(60)),
                },
                CoverageTier {
                    km_threshold: 100_000,
                    coverage_percent: dec!(60),
                    age_coverage_percent: None,
                },
            ],
            age_threshold_years: Some(8),
            max_coverage: Money::new(dec!(5000), Currency::CHF),
            excess_percent: dec!(10),
            excess_minimum: Money::new(dec!(150), Currency::CHF),
            vat_rate: dec!(8.1),
            vehicle_km: 40_000,
            vehicle_age_years: 4,
            policyholder_name: None,
        }
    }

    pub fn with_covered_category(
        mut self,
        category: impl Into<String>,
        components: Vec<String>,
    ) -> Self {
        let category = category.into();
        self.covered_categories.insert(category.clone());
        self.covered_components.insert(category, components);
        self
    }

    pub fn without_category(mut self, category: &str) -> Self {
        self.covered_categories.remove(category);
        self.covered_components.remove(category);
        self
    }

    pub fn with_excluded_component(mut self, component: impl Into<String>) -> Self {
        self.excluded_components.push(component.into());
        self
    }

    pub fn with_coverage_scale(mut self, scale: Vec<CoverageTier>) -> Self {
        self.coverage_scale = scale;
        self
    }

    pub fn with_vehicle(mut self, km: u32, age_years: u32) -> Self {
        self.vehicle_km = km;
        self.vehicle_age_years = age_years;
        self
    }

    pub fn with_excess(mut self, percent: Decimal, minimum: Decimal) -> Self {
        self.excess_percent = percent;
        self.excess_minimum = Money::new(minimum, Currency::CHF);
        self
    }

    pub fn with_max_coverage(mut self, amount: Decimal) -> Self {
        self.max_coverage = Money::new(amount, Currency::CHF);
        self
    }

    pub fn with_policyholder(mut self, name: impl Into<String>) -> Self {
        self.policyholder_name = Some(name.into());
        self
    }

    pub fn build(self) -> PolicyContext {
        PolicyContext {
            covered_categories: self.covered_categories,
            covered_components: self.covered_components,
            excluded_components: self.excluded_components,
            coverage_scale: self.coverage_scale,
            age_threshold_years: self.age_threshold_years,
            max_coverage: self.max_coverage,
            excess_percent: self.excess_percent,
            excess_minimum: self.excess_minimum,
            vat_rate: self.vat_rate,
            vehicle_km: self.vehicle_km,
            vehicle_age_years: self.vehicle_age_years,
            currency: Currency::CHF,
            policyholder_name: self.policyholder_name,
        }
    }
}
