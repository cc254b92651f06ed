//! Composable predicates over a [`Scenario`].
//!
//! Leaf specifications test one scenario field. They compose with `&`, `|`
//! and `!` into new specifications, evaluated with short-circuiting. Every
//! specification renders as a readable expression and can explain its
//! outcome for a given scenario.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use serde::Serialize;

use crate::records::Scenario;
use crate::types::{DcClass, DetectorClass, Event, Target};

type Predicate = Arc<dyn Fn(&Scenario) -> bool + Send + Sync>;

/// A boolean condition on a scenario.
#[derive(Clone)]
pub enum Specification {
    /// Beamline is one of the given names.
    Beamline(BTreeSet<String>),
    Event(Event),
    DcClass(DcClass),
    DetectorClass(DetectorClass),
    /// Visit starts with one of the given prefixes.
    VisitPrefix(BTreeSet<String>),
    Target(Target),
    /// A named condition not expressible with the other leaves.
    Custom { name: String, predicate: Predicate },
    And(Box<Specification>, Box<Specification>),
    Or(Box<Specification>, Box<Specification>),
    Not(Box<Specification>),
}

impl Specification {
    pub fn beamline(name: impl Into<String>) -> Self {
        Self::Beamline(BTreeSet::from([name.into()]))
    }

    pub fn beamlines<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Beamline(names.into_iter().map(Into::into).collect())
    }

    pub fn event(event: Event) -> Self {
        Self::Event(event)
    }

    pub fn dcclass(dcclass: DcClass) -> Self {
        Self::DcClass(dcclass)
    }

    pub fn detector_class(detectorclass: DetectorClass) -> Self {
        Self::DetectorClass(detectorclass)
    }

    pub fn visit_prefix<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::VisitPrefix(prefixes.into_iter().map(Into::into).collect())
    }

    pub fn target(target: Target) -> Self {
        Self::Target(target)
    }

    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Scenario) -> bool + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// `END` or `END_GROUP`.
    pub fn is_end_of_any() -> Self {
        Self::event(Event::End) | Self::event(Event::EndGroup)
    }

    /// Fixed-target or jet serial collection.
    pub fn is_serial() -> Self {
        Self::dcclass(DcClass::SerialFixed) | Self::dcclass(DcClass::SerialJet)
    }

    pub fn is_satisfied_by(&self, scenario: &Scenario) -> bool {
        match self {
            Self::Beamline(names) => names.contains(&scenario.beamline),
            Self::Event(event) => scenario.event == *event,
            Self::DcClass(dcclass) => scenario.dcclass == *dcclass,
            Self::DetectorClass(detectorclass) => scenario.detectorclass == Some(*detectorclass),
            Self::VisitPrefix(prefixes) => prefixes
                .iter()
                .any(|prefix| scenario.visit.starts_with(prefix.as_str())),
            Self::Target(target) => scenario.target == Some(*target),
            Self::Custom { predicate, .. } => predicate(scenario),
            Self::And(first, second) => {
                first.is_satisfied_by(scenario) && second.is_satisfied_by(scenario)
            }
            Self::Or(first, second) => {
                first.is_satisfied_by(scenario) || second.is_satisfied_by(scenario)
            }
            Self::Not(subject) => !subject.is_satisfied_by(scenario),
        }
    }

    /// Evaluate and record which sub-specifications decided the outcome.
    ///
    /// Branches skipped by short-circuiting do not appear in the tree.
    pub fn explain(&self, scenario: &Scenario) -> Evaluation {
        let (satisfied, children) = match self {
            Self::And(first, second) => {
                let left = first.explain(scenario);
                if !left.satisfied {
                    (false, vec![left])
                } else {
                    let right = second.explain(scenario);
                    (right.satisfied, vec![left, right])
                }
            }
            Self::Or(first, second) => {
                let left = first.explain(scenario);
                if left.satisfied {
                    (true, vec![left])
                } else {
                    let right = second.explain(scenario);
                    (right.satisfied, vec![left, right])
                }
            }
            Self::Not(subject) => {
                let inner = subject.explain(scenario);
                (!inner.satisfied, vec![inner])
            }
            _ => (self.is_satisfied_by(scenario), Vec::new()),
        };
        Evaluation {
            specification: self.to_string(),
            satisfied,
            children,
        }
    }
}

fn write_set(
    f: &mut fmt::Formatter<'_>,
    field: &str,
    op: &str,
    values: &BTreeSet<String>,
) -> fmt::Result {
    let joined: Vec<&str> = values.iter().map(String::as_str).collect();
    match joined.as_slice() {
        [single] => write!(f, "{field} {op} {single}"),
        _ => write!(f, "{field} {op} {{{}}}", joined.join(", ")),
    }
}

impl fmt::Display for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Beamline(names) => {
                let op = if names.len() == 1 { "==" } else { "in" };
                write_set(f, "beamline", op, names)
            }
            Self::Event(event) => write!(f, "event == {event}"),
            Self::DcClass(dcclass) => write!(f, "dcclass == {dcclass}"),
            Self::DetectorClass(detectorclass) => write!(f, "detectorclass == {detectorclass}"),
            Self::VisitPrefix(prefixes) => write_set(f, "visit", "startswith", prefixes),
            Self::Target(target) => write!(f, "target == {target}"),
            Self::Custom { name, .. } => f.write_str(name),
            Self::And(first, second) => write!(f, "({first} & {second})"),
            Self::Or(first, second) => write!(f, "({first} | {second})"),
            Self::Not(subject) => write!(f, "!{subject}"),
        }
    }
}

impl fmt::Debug for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Specification({self})")
    }
}

impl BitAnd for Specification {
    type Output = Specification;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Specification {
    type Output = Specification;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::Or(Box::new(self), Box::new(rhs))
    }
}

impl Not for Specification {
    type Output = Specification;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}

/// Outcome of evaluating a specification, with the sub-evaluations it used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub specification: String,
    pub satisfied: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Evaluation>,
}
