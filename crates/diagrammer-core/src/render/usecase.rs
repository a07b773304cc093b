use super::{indent, safe_id, IdMap};
use crate::usecase::*;

/// Render as PlantUML.
pub fn render(diagram: &UseCaseDiagram) -> String {
    let mut actors = IdMap::default();
    let mut use_cases = IdMap::default();
    for package in &diagram.packages {
        for actor in &package.actors {
            actors.declare(&actor.name, actor_id(&actor.name));
        }
        for use_case in &package.use_cases {
            use_cases.declare(&use_case.name, use_case_id(&use_case.name));
        }
    }

    let mut out = String::with_capacity(1024);
    out.push_str("@startuml\n");
    out.push_str("left to right direction\n");

    for package in &diagram.packages {
        out.push_str(&format!("package \"{}\" {{\n", plain(&package.name)));
        for actor in &package.actors {
            indent(&mut out, 1);
            out.push_str(&format!(
                "actor \"{}\" as {}\n",
                plain(&actor.name),
                actors.get(&actor.name, actor_id)
            ));
        }
        for use_case in &package.use_cases {
            indent(&mut out, 1);
            out.push_str(&format!(
                "usecase \"{}\" as {}\n",
                plain(&use_case.name),
                use_cases.get(&use_case.name, use_case_id)
            ));
        }
        out.push_str("}\n");
    }

    for package in &diagram.packages {
        for a in &package.associations {
            out.push_str(&format!(
                "{} --> {}\n",
                actors.get(&a.actor, actor_id),
                use_cases.get(&a.use_case, use_case_id)
            ));
        }
        for i in &package.includes {
            out.push_str(&format!(
                "{} ..> {} : <<include>>\n",
                use_cases.get(&i.base, use_case_id),
                use_cases.get(&i.included, use_case_id)
            ));
        }
        for e in &package.extends {
            out.push_str(&format!(
                "{} ..> {} : <<extend>>",
                use_cases.get(&e.extension, use_case_id),
                use_cases.get(&e.base, use_case_id)
            ));
            if let Some(condition) = &e.condition {
                out.push_str(&format!("\\n{}", plain(condition)));
            }
            out.push('\n');
        }
    }

    out.push_str("@enduml\n");
    out
}

fn actor_id(name: &str) -> String {
    format!("A_{}", safe_id(name))
}

fn use_case_id(name: &str) -> String {
    format!("UC_{}", safe_id(name))
}

// PlantUML has no escape for `"` inside a quoted name.
fn plain(text: &str) -> String {
    text.replace('"', "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_packages_and_relations() {
        let diagram = UseCaseDiagram {
            packages: vec![Package {
                name: "Shop".into(),
                actors: vec![Actor {
                    name: "Customer".into(),
                    description: String::new(),
                }],
                use_cases: vec![
                    UseCase {
                        name: "Place order".into(),
                        description: String::new(),
                    },
                    UseCase {
                        name: "Pay".into(),
                        description: String::new(),
                    },
                    UseCase {
                        name: "Use coupon".into(),
                        description: String::new(),
                    },
                ],
                associations: vec![Association {
                    actor: "Customer".into(),
                    use_case: "Place order".into(),
                }],
                includes: vec![Include {
                    base: "Place order".into(),
                    included: "Pay".into(),
                }],
                extends: vec![Extend {
                    base: "Pay".into(),
                    extension: "Use coupon".into(),
                    condition: Some("has coupon".into()),
                }],
            }],
        };
        let expected = "\
@startuml
left to right direction
package \"Shop\" {
    actor \"Customer\" as A_Customer
    usecase \"Place order\" as UC_Place_order
    usecase \"Pay\" as UC_Pay
    usecase \"Use coupon\" as UC_Use_coupon
}
A_Customer --> UC_Place_order
UC_Place_order ..> UC_Pay : <<include>>
UC_Use_coupon ..> UC_Pay : <<extend>>\\nhas coupon
@enduml
";
        assert_eq!(render(&diagram), expected);
    }

    #[test]
    fn similar_use_case_names_get_distinct_aliases() {
        let use_case = |name: &str| UseCase {
            name: name.into(),
            description: String::new(),
        };
        let diagram = UseCaseDiagram {
            packages: vec![Package {
                name: "Airport".into(),
                actors: vec![Actor {
                    name: "Passenger".into(),
                    description: String::new(),
                }],
                use_cases: vec![use_case("Check in"), use_case("Check-in")],
                associations: vec![
                    Association {
                        actor: "Passenger".into(),
                        use_case: "Check in".into(),
                    },
                    Association {
                        actor: "Passenger".into(),
                        use_case: "Check-in".into(),
                    },
                ],
                includes: vec![],
                extends: vec![],
            }],
        };
        let text = render(&diagram);
        assert!(text.contains("usecase \"Check in\" as UC_Check_in\n"));
        assert!(text.contains("usecase \"Check-in\" as UC_Check_in_2\n"));
        assert!(text.contains("A_Passenger --> UC_Check_in\n"));
        assert!(text.contains("A_Passenger --> UC_Check_in_2\n"));
    }
}
