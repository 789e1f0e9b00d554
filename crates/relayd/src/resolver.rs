//! Action resolver - maps (verb, entity domain) to a concrete service call.
//!
//! The compatibility table is fixed; a domain that does not support the
//! requested verb yields `IncompatibleVerb`, which upstream treats as a
//! deterministic miss rather than a system error.

use relay_common::types::{CatalogEntity, EntityDomain, ServiceCall, Verb};
use relay_common::RelayError;

/// Whether the domain supports the verb at all. Also used by the matcher's
/// tie-break.
pub fn supports(verb: Verb, domain: EntityDomain) -> bool {
    use EntityDomain::*;
    match verb {
        Verb::TurnOn => matches!(
            domain,
            Light | Switch | Fan | InputBoolean | Cover | Lock | Scene | Script
        ),
        Verb::TurnOff => matches!(domain, Light | Switch | Fan | InputBoolean | Cover | Lock),
        Verb::Toggle => matches!(domain, Light | Switch | Fan | InputBoolean | Cover),
        Verb::SetLevel => matches!(domain, Light | Climate),
        Verb::Unknown => false,
    }
}

/// Resolve a verb against an entity into the service call to execute.
pub fn resolve(
    verb: Verb,
    entity: &CatalogEntity,
    level: Option<f64>,
) -> Result<ServiceCall, RelayError> {
    use EntityDomain::*;

    let incompatible = || RelayError::IncompatibleVerb {
        verb: verb.to_string(),
        domain: entity.domain.to_string(),
    };

    let call = match verb {
        Verb::TurnOn => match entity.domain {
            Light | Switch | Fan | InputBoolean | Scene | Script => {
                service(entity, "turn_on", None)
            }
            Cover => service(entity, "open_cover", None),
            Lock => service(entity, "lock", None),
            Climate => return Err(incompatible()),
        },
        Verb::TurnOff => match entity.domain {
            Light | Switch | Fan | InputBoolean => service(entity, "turn_off", None),
            Cover => service(entity, "close_cover", None),
            Lock => service(entity, "unlock", None),
            Climate | Scene | Script => return Err(incompatible()),
        },
        Verb::Toggle => match entity.domain {
            // The host exposes a domain-generic toggle
            Light | Switch | Fan | InputBoolean | Cover => ServiceCall {
                domain: "homeassistant".to_string(),
                service: "toggle".to_string(),
                entity_id: entity.id.clone(),
                level: None,
            },
            Climate | Lock | Scene | Script => return Err(incompatible()),
        },
        Verb::SetLevel => match entity.domain {
            Light => service(entity, "turn_on", level),
            Climate => service(entity, "set_temperature", level),
            _ => return Err(incompatible()),
        },
        Verb::Unknown => return Err(incompatible()),
    };

    Ok(call)
}

fn service(entity: &CatalogEntity, name: &str, level: Option<f64>) -> ServiceCall {
    ServiceCall {
        domain: entity.domain.to_string(),
        service: name.to_string(),
        entity_id: entity.id.clone(),
        level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, domain: EntityDomain) -> CatalogEntity {
        CatalogEntity {
            id: id.to_string(),
            domain,
            friendly_name: id.to_string(),
            aliases: Vec::new(),
            area: None,
        }
    }

    #[test]
    fn test_turn_off_light() {
        let call = resolve(Verb::TurnOff, &entity("light.office_light", EntityDomain::Light), None)
            .unwrap();
        assert_eq!(call.domain, "light");
        assert_eq!(call.service, "turn_off");
        assert_eq!(call.entity_id, "light.office_light");
        assert_eq!(call.level, None);
    }

    #[test]
    fn test_turn_on_cover_opens() {
        let call =
            resolve(Verb::TurnOn, &entity("cover.garage", EntityDomain::Cover), None).unwrap();
        assert_eq!(call.service, "open_cover");
    }

    #[test]
    fn test_lock_maps_on_to_lock_off_to_unlock() {
        let on = resolve(Verb::TurnOn, &entity("lock.front", EntityDomain::Lock), None).unwrap();
        assert_eq!(on.service, "lock");
        let off = resolve(Verb::TurnOff, &entity("lock.front", EntityDomain::Lock), None).unwrap();
        assert_eq!(off.service, "unlock");
    }

    #[test]
    fn test_toggle_uses_generic_service() {
        let call = resolve(Verb::Toggle, &entity("fan.attic", EntityDomain::Fan), None).unwrap();
        assert_eq!(call.domain, "homeassistant");
        assert_eq!(call.service, "toggle");
        assert_eq!(call.entity_id, "fan.attic");
    }

    #[test]
    fn test_set_level_on_light_and_climate() {
        let light =
            resolve(Verb::SetLevel, &entity("light.desk", EntityDomain::Light), Some(40.0))
                .unwrap();
        assert_eq!(light.service, "turn_on");
        assert_eq!(light.level, Some(40.0));

        let climate = resolve(
            Verb::SetLevel,
            &entity("climate.living", EntityDomain::Climate),
            Some(21.5),
        )
        .unwrap();
        assert_eq!(climate.service, "set_temperature");
        assert_eq!(climate.level, Some(21.5));
    }

    #[test]
    fn test_set_level_on_switch_is_incompatible() {
        let err = resolve(
            Verb::SetLevel,
            &entity("switch.plug", EntityDomain::Switch),
            Some(50.0),
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::IncompatibleVerb { .. }));
    }

    #[test]
    fn test_scene_only_turns_on() {
        assert!(resolve(Verb::TurnOn, &entity("scene.movie", EntityDomain::Scene), None).is_ok());
        assert!(resolve(Verb::TurnOff, &entity("scene.movie", EntityDomain::Scene), None).is_err());
        assert!(!supports(Verb::TurnOff, EntityDomain::Scene));
    }

    #[test]
    fn test_unknown_verb_never_resolves() {
        for domain in [EntityDomain::Light, EntityDomain::Fan, EntityDomain::Lock] {
            assert!(!supports(Verb::Unknown, domain));
            assert!(resolve(Verb::Unknown, &entity("x.y", domain), None).is_err());
        }
    }
}
