//! Compteurs de points par pays

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::country::CountrySet;

/// Ligne de statistiques pour un pays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryEntry {
    pub country_id: String,
    pub name: String,
    pub hit_count: u64,
}

/// Résultat d'un incrément
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// Pays absent du registre, rien n'est compté
    Unknown,
    /// Compteur incrémenté
    Counted,
    /// Premier point de ce pays : il devient visible
    FirstHit,
}

/// Compteurs alignés sur les pays de l'ensemble enregistré
struct Registry {
    countries: Arc<CountrySet>,
    hits: Vec<AtomicU64>,
}

/// Compteurs de points par identifiant de pays
///
/// Lié à un seul ensemble de pays, celui chargé par le cache. Les incréments
/// passent par un verrou en lecture et un compteur atomique. `snapshot` prend
/// le verrou en écriture pour obtenir une vue cohérente.
#[derive(Default)]
pub struct HitCountAggregator {
    registry: RwLock<Option<Registry>>,
}

impl HitCountAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crée une entrée à zéro par pays. Retourne vrai au premier enregistrement.
    ///
    /// Réenregistrer le même ensemble ne change rien. Un autre ensemble est
    /// ignoré : les compteurs restent ceux du premier.
    pub fn register(&self, countries: &Arc<CountrySet>) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        match registry.as_ref() {
            Some(current) if Arc::ptr_eq(&current.countries, countries) => false,
            Some(current) => {
                warn!(
                    registered = current.countries.len(),
                    ignored = countries.len(),
                    "Countries already registered, new set ignored"
                );
                false
            }
            None => {
                let hits = countries.features().iter().map(|_| AtomicU64::new(0)).collect();
                *registry = Some(Registry {
                    countries: Arc::clone(countries),
                    hits,
                });
                debug!(countries = countries.len(), "Countries registered");
                true
            }
        }
    }

    /// Incrémente le compteur d'un pays, et le rend visible au premier point
    pub fn increment(&self, country_id: &str) -> IncrementOutcome {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        let Some(registry) = registry.as_ref() else {
            return IncrementOutcome::Unknown;
        };
        let Some(position) = registry.countries.position(country_id) else {
            return IncrementOutcome::Unknown;
        };

        registry.hits[position].fetch_add(1, Ordering::Relaxed);
        if registry.countries.features()[position].mark_visible() {
            IncrementOutcome::FirstHit
        } else {
            IncrementOutcome::Counted
        }
    }

    pub fn hit_count(&self, country_id: &str) -> Option<u64> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        let registry = registry.as_ref()?;
        registry
            .countries
            .position(country_id)
            .map(|position| registry.hits[position].load(Ordering::Relaxed))
    }

    /// Vue cohérente des compteurs, triée par nombre de points croissant
    ///
    /// Le tri est stable : à égalité, l'ordre de la source est conservé.
    pub fn snapshot(&self) -> Vec<CountryEntry> {
        let registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let Some(registry) = registry.as_ref() else {
            return Vec::new();
        };
        let mut entries: Vec<CountryEntry> = registry
            .countries
            .features()
            .iter()
            .zip(&registry.hits)
            .map(|(feature, hits)| CountryEntry {
                country_id: feature.country_id.clone(),
                name: feature.name.clone(),
                hit_count: hits.load(Ordering::Relaxed),
            })
            .collect();

        entries.sort_by_key(|entry| entry.hit_count);
        entries
    }

    pub fn total_hits(&self) -> u64 {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.as_ref().map_or(0, |registry| {
            registry
                .hits
                .iter()
                .map(|hits| hits.load(Ordering::Relaxed))
                .sum()
        })
    }

    pub fn len(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |registry| registry.hits.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
