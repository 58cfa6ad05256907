//! Fixture vocabulary
//!
//! A small bilingual tenant vocabulary covering the components the test
//! policies reference, with the standard exclusion and consumable pattern
//! tables.

use once_cell::sync::Lazy;

use domain_policy::ComponentVocabulary;

const STANDARD_VOCABULARY_JSON: &str = r#"{
    "component_synonyms": {
        "oil_cooler": ["Ölkühler", "Oelkuehler", "Ölkühlergehäuse", "radiateur d'huile"],
        "egr_valve": ["AGR-Ventil", "Abgasrückführung", "vanne EGR"],
        "water_pump": ["Wasserpumpe", "pompe à eau"],
        "asr": [],
        "turbocharger": ["Turbolader", "turbocompresseur"]
    },
    "component_categories": {
        "oil_cooler": "engine",
        "egr_valve": "engine",
        "water_pump": "engine",
        "asr": "brakes",
        "turbocharger": "engine"
    },
    "category_aliases": {
        "Motor": "engine",
        "moteur": "engine"
    },
    "repair_context_keywords": {
        "olkuhler ersetzen": {"component": "oil_cooler", "category": "engine"},
        "olkuhler erneuern": {"component": "oil_cooler", "category": "engine"},
        "agr ventil ersetzen": {"component": "egr_valve", "category": "engine"},
        "turbolader ersetzen": {"component": "turbocharger", "category": "engine"}
    },
    "part_catalog": {
        "by_part_number": {
            "11427525333": {"component": "oil_cooler", "category": "engine"},
            "11657934604": {"component": "turbocharger", "category": "engine"},
            "34116850885": {"component": "brake_disc", "category": "brakes"}
        },
        "by_keyword": {
            "olkuhlergehause": {"component": "oil_cooler", "category": "engine"}
        }
    },
    "exclusion_patterns": [
        {"label": "disposal", "pattern": "entsorgung|altteile|recyclage"},
        {"label": "cleaning", "pattern": "reinigung|nettoyage"},
        {"label": "rental_car", "pattern": "mietwagen|ersatzwagen|voiture de remplacement"},
        {"label": "environmental_fee", "pattern": "umweltpauschale|taxe environnementale"},
        {"label": "diagnostic_only", "pattern": "diagnose|fehlerspeicher|diagnostic"},
        {"label": "calibration_only", "pattern": "kalibrierung|calibrage"}
    ],
    "consumable_patterns": [
        {"label": "oil", "pattern": "\\bmotorol\\b|motorenol|huile moteur|\\batf\\b"},
        {"label": "filter", "pattern": "olfilter|luftfilter|filtre"},
        {"label": "coolant", "pattern": "kuhlmittel|frostschutz|liquide de refroidissement"},
        {"label": "small_parts", "pattern": "kleinteile|kleinersatzteile"}
    ],
    "gasket_indicators": ["dichtung", "dichtungssatz", "joint"],
    "context_hints": [
        {"term": "ventil", "context": "hydraulik", "component": "hydraulic_valve", "category": "chassis"},
        {"term": "ventil", "context": "agr", "component": "egr_valve", "category": "engine"}
    ],
    "distribution_catch_all_terms": ["steuerkette", "zahnriemen"],
    "distribution_catch_all_category": "engine"
}"#;

static STANDARD_VOCABULARY: Lazy<ComponentVocabulary> = Lazy::new(|| {
    ComponentVocabulary::from_json_str(STANDARD_VOCABULARY_JSON)
        .expect("fixture vocabulary must be valid")
});

/// Returns the shared fixture vocabulary.
pub fn standard_vocabulary() -> ComponentVocabulary {
    STANDARD_VOCABULARY.clone()
}
