//! Credit Pack Catalog
//!
//! Maps Stripe price ids to the number of credits they buy. Built once at
//! startup and shared read-only by checkout and settlement.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PaymentError, Result};

/// Legacy per-tier environment variables and the credits each one grants
const TIER_VARS: [(&str, u64); 3] = [
    ("STRIPE_10_PACK", 10),
    ("STRIPE_25_PACK", 25),
    ("STRIPE_100_PACK", 100),
];

/// A purchasable credit pack
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPackage {
    /// Stripe price id
    pub price_id: String,

    /// Credits granted per purchase
    pub credits: u64,

    /// Display label
    pub label: String,
}

impl CreditPackage {
    pub fn new(price_id: impl Into<String>, credits: u64) -> Self {
        Self {
            price_id: price_id.into(),
            credits,
            label: format!("{credits} credits"),
        }
    }
}

/// Immutable price id -> credit pack mapping
#[derive(Clone, Debug)]
pub struct PackageCatalog {
    packages: HashMap<String, CreditPackage>,
}

impl PackageCatalog {
    /// Build a catalog, rejecting empty, duplicate or zero-credit entries
    pub fn new(packages: impl IntoIterator<Item = CreditPackage>) -> Result<Self> {
        let mut map = HashMap::new();

        for package in packages {
            if package.price_id.trim().is_empty() {
                return Err(PaymentError::Config("empty price id in catalog".into()));
            }
            if package.credits == 0 {
                return Err(PaymentError::Config(format!(
                    "price {} grants zero credits",
                    package.price_id
                )));
            }
            if map.contains_key(&package.price_id) {
                return Err(PaymentError::Config(format!(
                    "duplicate price id {}",
                    package.price_id
                )));
            }
            map.insert(package.price_id.clone(), package);
        }

        if map.is_empty() {
            return Err(PaymentError::Config("credit catalog is empty".into()));
        }

        Ok(Self { packages: map })
    }

    /// Parse `price_a:10,price_b:25` into a catalog
    pub fn parse(raw: &str) -> Result<Self> {
        let packages = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (price_id, credits) = entry.rsplit_once(':').ok_or_else(|| {
                    PaymentError::Config(format!("catalog entry '{entry}' is not price:credits"))
                })?;
                let credits = credits.trim().parse::<u64>().map_err(|_| {
                    PaymentError::Config(format!("catalog entry '{entry}' has invalid credits"))
                })?;
                Ok(CreditPackage::new(price_id.trim(), credits))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(packages)
    }

    /// Load from `CREDIT_PACKAGES`, falling back to the three tier variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup("CREDIT_PACKAGES") {
            return Self::parse(&raw);
        }

        let packages = TIER_VARS
            .iter()
            .map(|(var, credits)| {
                lookup(var)
                    .map(|price_id| CreditPackage::new(price_id, *credits))
                    .ok_or_else(|| PaymentError::Config(format!("{var} not set")))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(packages)
    }

    /// Look up a pack by Stripe price id
    pub fn get(&self, price_id: &str) -> Option<&CreditPackage> {
        self.packages.get(price_id)
    }

    pub fn contains(&self, price_id: &str) -> bool {
        self.packages.contains_key(price_id)
    }

    /// Credits granted by a price id
    pub fn credits_for(&self, price_id: &str) -> Option<u64> {
        self.get(price_id).map(|p| p.credits)
    }

    /// All packs, smallest first
    pub fn packages(&self) -> Vec<&CreditPackage> {
        let mut packages: Vec<_> = self.packages.values().collect();
        packages.sort_by(|a, b| a.credits.cmp(&b.credits).then(a.price_id.cmp(&b.price_id)));
        packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
