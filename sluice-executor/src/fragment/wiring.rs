//! Port pairing for `add_flow`.

use sluice_core::error::{Result, SluiceError};
use sluice_core::port::{PortDirection, PortSpec};
use sluice_core::spec::OperatorSpec;

/// Where a pairing lands on the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    /// An existing single-receiver port.
    Port(String),
    /// A new receiver of this repeated port.
    Repeated(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pairing {
    pub(crate) output: String,
    pub(crate) target: Target,
}

/// One side of a flow.
pub(crate) struct Side<'a> {
    pub(crate) name: &'a str,
    pub(crate) spec: &'a OperatorSpec,
}

/// Resolve the requested port pairs into concrete pairings.
///
/// No pairs (or an empty name on either side) means the operator's sole port
/// of that direction. Nothing is mutated, so a failure leaves the fragment
/// unchanged.
pub(crate) fn resolve(up: Side<'_>, down: Side<'_>, pairs: &[(&str, &str)]) -> Result<Vec<Pairing>> {
    let requested: &[(&str, &str)] = if pairs.is_empty() { &[("", "")] } else { pairs };

    requested
        .iter()
        .map(|&(out, input)| {
            let output = output_port(&up, out)?;
            let target_port = input_port(&down, input)?;

            if !target_port.tag.accepts(&output.tag) {
                return Err(SluiceError::PortTypeMismatch {
                    location: format!("{}.{} -> {}.{}", up.name, output.name, down.name, target_port.name),
                    expected: target_port.tag.name().to_string(),
                    actual: output.tag.name().to_string(),
                });
            }

            let target = if target_port.is_repeated() {
                Target::Repeated(target_port.name.clone())
            } else {
                Target::Port(target_port.name.clone())
            };
            Ok(Pairing {
                output: output.name.clone(),
                target,
            })
        })
        .collect()
}

fn output_port<'a>(side: &Side<'a>, name: &str) -> Result<&'a PortSpec> {
    let ports: Vec<&PortSpec> = side.spec.outputs().iter().collect();
    pick(side.name, PortDirection::Output, &ports, name)
}

fn input_port<'a>(side: &Side<'a>, name: &str) -> Result<&'a PortSpec> {
    let ports: Vec<&PortSpec> = side.spec.declared_inputs().collect();
    pick(side.name, PortDirection::Input, &ports, name)
}

fn pick<'a>(
    operator: &str,
    direction: PortDirection,
    ports: &[&'a PortSpec],
    name: &str,
) -> Result<&'a PortSpec> {
    let names = || ports.iter().map(|p| p.name.clone()).collect::<Vec<_>>();
    if name.is_empty() {
        return match ports {
            [only] => Ok(*only),
            [] => Err(SluiceError::PortPairing {
                operator: operator.to_string(),
                cause: format!("operator has no {} ports", direction),
            }),
            _ => Err(SluiceError::AmbiguousPort {
                operator: operator.to_string(),
                direction,
                candidates: names(),
            }),
        };
    }
    ports
        .iter()
        .copied()
        .find(|p| p.name == name)
        .ok_or_else(|| SluiceError::UnknownPort {
            operator: operator.to_string(),
            port: name.to_string(),
            direction,
            available: names(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(build: impl FnOnce(&mut OperatorSpec)) -> OperatorSpec {
        let mut spec = OperatorSpec::new();
        build(&mut spec);
        spec
    }

    #[test]
    fn infers_sole_ports() {
        let up = spec(|s| {
            s.output::<i64>("out");
        });
        let down = spec(|s| {
            s.input::<i64>("in");
        });
        let pairs = resolve(Side { name: "p", spec: &up }, Side { name: "c", spec: &down }, &[]).unwrap();
        assert_eq!(
            pairs,
            vec![Pairing {
                output: "out".into(),
                target: Target::Port("in".into())
            }]
        );
    }

    #[test]
    fn ambiguous_output_names_producer() {
        let up = spec(|s| {
            s.output::<i64>("a");
            s.output::<i64>("b");
        });
        let down = spec(|s| {
            s.input::<i64>("in");
        });
        let err = resolve(Side { name: "producer", spec: &up }, Side { name: "c", spec: &down }, &[])
            .unwrap_err();
        assert!(matches!(
            err,
            SluiceError::AmbiguousPort { ref operator, direction: PortDirection::Output, .. }
                if operator == "producer"
        ));
    }

    #[test]
    fn empty_name_on_one_side_only() {
        let up = spec(|s| {
            s.output::<i64>("a");
            s.output::<i64>("b");
        });
        let down = spec(|s| {
            s.input::<i64>("in");
        });
        let pairs =
            resolve(Side { name: "p", spec: &up }, Side { name: "c", spec: &down }, &[("b", "")]).unwrap();
        assert_eq!(pairs[0].output, "b");
    }

    #[test]
    fn repeated_target() {
        let up = spec(|s| {
            s.output::<f32>("out");
        });
        let down = spec(|s| {
            s.repeated_input::<f32>("values");
        });
        let pairs = resolve(Side { name: "p", spec: &up }, Side { name: "c", spec: &down }, &[]).unwrap();
        assert_eq!(pairs[0].target, Target::Repeated("values".into()));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let up = spec(|s| {
            s.output::<String>("out");
        });
        let down = spec(|s| {
            s.input::<i64>("in");
        });
        let err = resolve(Side { name: "p", spec: &up }, Side { name: "c", spec: &down }, &[]).unwrap_err();
        assert!(matches!(err, SluiceError::PortTypeMismatch { ref location, .. } if location == "p.out -> c.in"));
    }

    #[test]
    fn unknown_port_lists_available() {
        let up = spec(|s| {
            s.output::<i64>("out");
        });
        let down = spec(|s| {
            s.input::<i64>("in");
        });
        let err = resolve(Side { name: "p", spec: &up }, Side { name: "c", spec: &down }, &[("out", "inn")])
            .unwrap_err();
        assert!(matches!(err, SluiceError::UnknownPort { ref available, .. } if available == &vec!["in".to_string()]));
    }
}
