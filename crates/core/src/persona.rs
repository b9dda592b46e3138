//! Persona and scenario templates.
//!
//! A [`Persona`] describes the behavioral profile of the simulated caller and
//! a [`Scenario`] the situation they are calling about. Sessions copy both by
//! value at creation time; editing a template later never rewrites the history
//! of sessions that used it.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A named behavioral template for the simulated client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub traits: Vec<String>,
}

/// A named situational template paired with a persona for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub context: String,
}

/// The built-in persona set, used whenever the template catalog is
/// unavailable.
pub fn default_personas() -> Vec<Persona> {
    vec![
        Persona {
            id: "normal".into(),
            name: "Normal Customer".into(),
            description: "Polite customer asking standard questions about car repair".into(),
            traits: vec![
                "Patient and understanding".into(),
                "Clearly explains the problem".into(),
                "Asks about pricing and timelines".into(),
            ],
        },
        Persona {
            id: "unhappy".into(),
            name: "Unhappy Customer".into(),
            description: "Customer dissatisfied with previous service".into(),
            traits: vec![
                "Expresses disappointment".into(),
                "Brings up the previous bad experience".into(),
                "Still willing to work together".into(),
            ],
        },
        Persona {
            id: "angry".into(),
            name: "Angry Customer".into(),
            description: "Frustrated customer with service complaints".into(),
            traits: vec![
                "Frustrated and demanding".into(),
                "Complains about wasted time and money".into(),
                "Needs active de-escalation".into(),
            ],
        },
        Persona {
            id: "aggressive".into(),
            name: "Aggressive Customer".into(),
            description: "Very demanding and potentially hostile customer".into(),
            traits: vec![
                "Hostile and confrontational".into(),
                "Feels cheated and threatens to leave".into(),
                "Demands to speak to a manager".into(),
            ],
        },
    ]
}

/// The built-in scenario set, used whenever the template catalog is
/// unavailable.
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            id: "brake_repair".into(),
            name: "Brake Repair".into(),
            description: "Squeaking brakes, needs pad replacement".into(),
            context: "Customer had brake pads replaced last week, now hearing grinding noise"
                .into(),
        },
        Scenario {
            id: "engine_diagnostic".into(),
            name: "Engine Diagnostic".into(),
            description: "Check engine light on, possible sensor issue".into(),
            context: "The warning light came on two days ago and the engine idles rough".into(),
        },
        Scenario {
            id: "transmission_service".into(),
            name: "Transmission Service".into(),
            description: "Rough shifting, fluid change needed".into(),
            context: "Shifts hard between second and third gear, fluid has never been changed"
                .into(),
        },
        Scenario {
            id: "ac_repair".into(),
            name: "AC Repair".into(),
            description: "Not cooling properly, refrigerant leak".into(),
            context: "Air conditioning blows warm after ten minutes of driving".into(),
        },
        Scenario {
            id: "tire_replacement".into(),
            name: "Tire Replacement".into(),
            description: "Worn tires, alignment needed".into(),
            context: "Front tires are worn on the inside edge, car pulls to the right".into(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_sets_are_non_empty() {
        assert!(!default_personas().is_empty());
        assert!(!default_scenarios().is_empty());
    }

    #[test]
    fn default_ids_are_unique() {
        let personas = default_personas();
        let ids: HashSet<_> = personas.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), personas.len());

        let scenarios = default_scenarios();
        let ids: HashSet<_> = scenarios.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), scenarios.len());
    }

    #[test]
    fn persona_round_trips_through_json() {
        let persona = default_personas().swap_remove(2);
        let json = serde_json::to_string(&persona).unwrap();
        let back: Persona = serde_json::from_str(&json).unwrap();
        assert_eq!(back, persona);
    }

    #[test]
    fn scenario_traits_default_when_missing() {
        let json = r#"{"id":"x","name":"X","description":"d"}"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert!(scenario.context.is_empty());
    }
}
