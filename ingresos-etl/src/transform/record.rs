//! Output row of the detailed revenue report

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::sheet::RawCell;

static CLAVE_PRIMARIA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]\.)").expect("valid regex"));
static CLAVE_SECUNDARIA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]\d+\))").expect("valid regex"));

/// One line of the "Ingresos Detallado" report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRecord {
    pub concepto: Option<String>,
    pub estimado: RawCell,
    pub ampliaciones_reducciones: RawCell,
    pub modificado: RawCell,
    pub devengado: RawCell,
    pub recaudado: RawCell,
    pub diferencia: RawCell,
    pub clave_primaria: Option<String>,
    pub clave_secundaria: Option<String>,
    pub fecha: Option<String>,
    pub cuarto: Option<u8>,
    /// Surrogate key, empty until [`crate::keys::assign_keys`] runs
    pub id: String,
}

impl DetailRecord {
    /// Build a record from the seven cells of one window row
    /// (concepto followed by the six amounts).
    pub fn from_cells(cells: [RawCell; 7], fecha: Option<String>, cuarto: Option<u8>) -> Self {
        let [
            concepto,
            estimado,
            ampliaciones_reducciones,
            modificado,
            devengado,
            recaudado,
            diferencia,
        ] = cells;

        let concepto = Some(concepto.render()).filter(|s| !s.is_empty());
        let (clave_primaria, clave_secundaria) = match &concepto {
            Some(c) => (clave_primaria(c), clave_secundaria(c)),
            None => (None, None),
        };

        Self {
            concepto,
            estimado,
            ampliaciones_reducciones,
            modificado,
            devengado,
            recaudado,
            diferencia,
            clave_primaria,
            clave_secundaria,
            fecha,
            cuarto,
            id: String::new(),
        }
    }

    /// Concept text with blank rendered as ""
    pub fn concepto_str(&self) -> &str {
        self.concepto.as_deref().unwrap_or("")
    }

    /// The six amount cells in column order
    pub fn amounts(&self) -> [&RawCell; 6] {
        [
            &self.estimado,
            &self.ampliaciones_reducciones,
            &self.modificado,
            &self.devengado,
            &self.recaudado,
            &self.diferencia,
        ]
    }
}

/// Top-level code such as "A." at the start of a concept
pub fn clave_primaria(concepto: &str) -> Option<String> {
    CLAVE_PRIMARIA
        .captures(concepto)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Sub-item code such as "a1)" at the start of a concept
pub fn clave_secundaria(concepto: &str) -> Option<String> {
    CLAVE_SECUNDARIA
        .captures(concepto)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
