//! Equivalent-circuit strings: parsing, parameter layout and evaluation.
//!
//! Grammar (whitespace ignored):
//!
//! ```text
//! series  := term ('-' term)*
//! term    := element | 'p(' series (',' series)+ ')'
//! element := PREFIX INDEX        e.g. R0, C1, Wo1, CPE2
//! ```
//!
//! Parameters are laid out in order of appearance. Single-parameter elements
//! expose one parameter named like the element (`R0`); multi-parameter
//! elements expose `<name>_0`, `<name>_1`, ...

use std::collections::HashSet;
use std::fmt;

use num_complex::Complex64;
use thiserror::Error;

use super::elements::{ElementKind, angular_frequency};

/// Topology used by the analysis scripts this tool replaces.
pub const DEFAULT_CIRCUIT: &str = "R0-p(R1,C1)-p(R2-Wo1,C2)";

/// Initial guess paired with [`DEFAULT_CIRCUIT`].
pub const DEFAULT_INITIAL_GUESS: [f64; 7] = [0.1, 0.1, 10.0, 0.1, 0.1, 10.0, 1.0];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CircuitError {
    #[error("circuit string is empty")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unexpected end of circuit string")]
    UnexpectedEnd,
    #[error("unknown element '{0}'")]
    UnknownElement(String),
    #[error("element '{0}' needs an index (e.g. R0)")]
    MissingIndex(String),
    #[error("duplicate element name '{0}'")]
    DuplicateElement(String),
    #[error("parallel block at position {0} needs at least two branches")]
    SingleBranch(usize),
    #[error("expected {expected} parameter values, got {got}")]
    ParamCount { expected: usize, got: usize },
}

/// A named element together with where its parameters live.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub kind: ElementKind,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CircuitNode {
    Element(Element),
    Series(Vec<CircuitNode>),
    Parallel(Vec<CircuitNode>),
}

/// Description of one fit parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub unit: &'static str,
    pub kind: ElementKind,
    pub lower: f64,
    pub upper: f64,
}

/// A parsed equivalent circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    root: CircuitNode,
    params: Vec<ParamInfo>,
}

impl Circuit {
    pub fn parse(input: &str) -> Result<Self, CircuitError> {
        let chars: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
        if chars.is_empty() {
            return Err(CircuitError::Empty);
        }

        let mut parser = Parser {
            chars: &chars,
            pos: 0,
            params: Vec::new(),
            names: HashSet::new(),
        };
        let root = parser.series()?;
        if let Some(&ch) = chars.get(parser.pos) {
            return Err(CircuitError::UnexpectedChar { ch, pos: parser.pos });
        }

        Ok(Self {
            root,
            params: parser.params,
        })
    }

    pub fn params(&self) -> &[ParamInfo] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }

    /// Ensure a parameter vector matches this circuit.
    pub fn check_params(&self, params: &[f64]) -> Result<(), CircuitError> {
        if params.len() != self.params.len() {
            return Err(CircuitError::ParamCount {
                expected: self.params.len(),
                got: params.len(),
            });
        }
        Ok(())
    }

    /// Project `params` onto the element bounds in place.
    pub fn clamp_to_bounds(&self, params: &mut [f64]) {
        for (value, info) in params.iter_mut().zip(&self.params) {
            *value = value.clamp(info.lower, info.upper);
        }
    }

    /// Impedance at a single frequency (Hz).
    pub fn impedance(&self, params: &[f64], frequency: f64) -> Complex64 {
        eval(&self.root, params, angular_frequency(frequency))
    }

    /// Impedance at each frequency (Hz).
    pub fn predict(&self, params: &[f64], frequencies: &[f64]) -> Vec<Complex64> {
        frequencies.iter().map(|&f| self.impedance(params, f)).collect()
    }

    /// Elements in order of appearance.
    pub fn elements(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_elements(&self.root, &mut out);
        out
    }

    /// Count elements of the given kind.
    pub fn count_kind(&self, kind: ElementKind) -> usize {
        self.elements().iter().filter(|e| e.kind == kind).count()
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, &self.root)
    }
}

fn collect_elements<'a>(node: &'a CircuitNode, out: &mut Vec<&'a Element>) {
    match node {
        CircuitNode::Element(e) => out.push(e),
        CircuitNode::Series(nodes) | CircuitNode::Parallel(nodes) => {
            for n in nodes {
                collect_elements(n, out);
            }
        }
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &CircuitNode) -> fmt::Result {
    match node {
        CircuitNode::Element(e) => write!(f, "{}", e.name),
        CircuitNode::Series(nodes) => {
            for (i, n) in nodes.iter().enumerate() {
                if i > 0 {
                    write!(f, "-")?;
                }
                write_node(f, n)?;
            }
            Ok(())
        }
        CircuitNode::Parallel(nodes) => {
            write!(f, "p(")?;
            for (i, n) in nodes.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write_node(f, n)?;
            }
            write!(f, ")")
        }
    }
}

fn eval(node: &CircuitNode, params: &[f64], omega: f64) -> Complex64 {
    match node {
        CircuitNode::Element(e) => {
            let end = e.offset + e.kind.param_count();
            e.kind.impedance(&params[e.offset..end], omega)
        }
        CircuitNode::Series(nodes) => nodes.iter().map(|n| eval(n, params, omega)).sum(),
        CircuitNode::Parallel(nodes) => nodes
            .iter()
            .map(|n| eval(n, params, omega).inv())
            .sum::<Complex64>()
            .inv(),
    }
}

struct Parser<'a> {
    chars: &'a [char],
    pos: usize,
    params: Vec<ParamInfo>,
    names: HashSet<String>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn series(&mut self) -> Result<CircuitNode, CircuitError> {
        let mut nodes = vec![self.term()?];
        while self.peek() == Some('-') {
            self.pos += 1;
            nodes.push(self.term()?);
        }
        if nodes.len() == 1 {
            Ok(nodes.remove(0))
        } else {
            Ok(CircuitNode::Series(nodes))
        }
    }

    fn term(&mut self) -> Result<CircuitNode, CircuitError> {
        match self.peek() {
            None => Err(CircuitError::UnexpectedEnd),
            Some('p') if self.chars.get(self.pos + 1) == Some(&'(') => self.parallel(),
            Some(c) if c.is_ascii_alphabetic() => self.element(),
            Some(ch) => Err(CircuitError::UnexpectedChar { ch, pos: self.pos }),
        }
    }

    fn parallel(&mut self) -> Result<CircuitNode, CircuitError> {
        let start = self.pos;
        self.pos += 2;

        let mut branches = vec![self.series()?];
        loop {
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    branches.push(self.series()?);
                }
                Some(')') => {
                    self.pos += 1;
                    break;
                }
                Some(ch) => return Err(CircuitError::UnexpectedChar { ch, pos: self.pos }),
                None => return Err(CircuitError::UnexpectedEnd),
            }
        }

        if branches.len() < 2 {
            return Err(CircuitError::SingleBranch(start));
        }
        Ok(CircuitNode::Parallel(branches))
    }

    fn element(&mut self) -> Result<CircuitNode, CircuitError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        let split = name
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(name.len());
        let (prefix, index) = name.split_at(split);
        let kind = ElementKind::from_prefix(prefix)
            .ok_or_else(|| CircuitError::UnknownElement(name.clone()))?;
        if index.is_empty() {
            return Err(CircuitError::MissingIndex(name));
        }
        if !self.names.insert(name.clone()) {
            return Err(CircuitError::DuplicateElement(name));
        }

        let offset = self.params.len();
        let count = kind.param_count();
        for (i, (&unit, &(lower, upper))) in kind.units().iter().zip(kind.bounds()).enumerate() {
            let param_name = if count == 1 {
                name.clone()
            } else {
                format!("{name}_{i}")
            };
            self.params.push(ParamInfo {
                name: param_name,
                unit,
                kind,
                lower,
                upper,
            });
        }

        Ok(CircuitNode::Element(Element { name, kind, offset }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_circuit_layout_matches_initial_guess() {
        let circuit = Circuit::parse(DEFAULT_CIRCUIT).unwrap();
        assert_eq!(circuit.param_count(), DEFAULT_INITIAL_GUESS.len());
        assert_eq!(
            circuit.param_names(),
            vec!["R0", "R1", "C1", "R2", "Wo1_0", "Wo1_1", "C2"]
        );
        assert_eq!(circuit.to_string(), DEFAULT_CIRCUIT);
        assert_eq!(circuit.count_kind(ElementKind::Resistor), 3);
        assert_eq!(circuit.count_kind(ElementKind::WarburgOpen), 1);
    }

    #[test]
    fn whitespace_is_ignored() {
        let circuit = Circuit::parse(" R0 - p( R1 , C1 ) ").unwrap();
        assert_eq!(circuit.to_string(), "R0-p(R1,C1)");
    }

    #[test]
    fn nested_parallel_blocks_parse() {
        let circuit = Circuit::parse("R0-p(R1-p(R2,CPE1),C1)").unwrap();
        assert_eq!(circuit.param_names(), vec!["R0", "R1", "R2", "CPE1_0", "CPE1_1", "C1"]);
    }

    #[test]
    fn parse_errors_are_reported() {
        assert_eq!(Circuit::parse("  "), Err(CircuitError::Empty));
        assert_eq!(
            Circuit::parse("R0-X1"),
            Err(CircuitError::UnknownElement("X1".to_string()))
        );
        assert_eq!(Circuit::parse("R0-C"), Err(CircuitError::MissingIndex("C".to_string())));
        assert_eq!(
            Circuit::parse("R0-R0"),
            Err(CircuitError::DuplicateElement("R0".to_string()))
        );
        assert_eq!(Circuit::parse("R0-p(R1)"), Err(CircuitError::SingleBranch(3)));
        assert_eq!(Circuit::parse("R0-p(R1,C1"), Err(CircuitError::UnexpectedEnd));
        assert_eq!(
            Circuit::parse("R0)"),
            Err(CircuitError::UnexpectedChar { ch: ')', pos: 2 })
        );
    }

    #[test]
    fn randles_cell_matches_closed_form() {
        let circuit = Circuit::parse("R0-p(R1,C1)").unwrap();
        let params = [10.0, 100.0, 1e-5];
        let f = 50.0;
        let w = angular_frequency(f);
        let expected = Complex64::new(10.0, 0.0)
            + Complex64::new(100.0, 0.0) / Complex64::new(1.0, w * 100.0 * 1e-5);
        let z = circuit.impedance(&params, f);
        assert!((z - expected).norm() < 1e-9);
    }

    #[test]
    fn parallel_resistors_combine() {
        let circuit = Circuit::parse("p(R1,R2,R3)").unwrap();
        let z = circuit.impedance(&[6.0, 3.0, 2.0], 1.0);
        assert!((z.re - 1.0).abs() < 1e-12);
        assert!(z.im.abs() < 1e-12);
    }

    #[test]
    fn check_and_clamp_params() {
        let circuit = Circuit::parse("R0-CPE1").unwrap();
        assert_eq!(
            circuit.check_params(&[1.0]),
            Err(CircuitError::ParamCount { expected: 3, got: 1 })
        );
        let mut p = [-1.0, 2.0, 1.5];
        circuit.clamp_to_bounds(&mut p);
        assert!(p[0] > 0.0);
        assert_eq!(p[1], 2.0);
        assert_eq!(p[2], 1.0);
    }
}
