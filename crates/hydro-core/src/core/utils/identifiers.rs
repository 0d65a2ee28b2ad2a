use phf::{Map, Set, phf_map, phf_set};

static WATER_RESIDUE_NAMES: Set<&'static str> = phf_set! {
    "HOH", "WAT", "H2O", "SOL", "TIP3", "TP3", "T3P", "TIP4", "TP4", "T4P",
    "TIP5", "T5P", "SPC", "SPCE", "OPC", "OPC3", "DOD",
};

static ION_RESIDUE_NAMES: Set<&'static str> = phf_set! {
    "NA", "Na+", "NA+", "K", "K+", "CL", "Cl-", "CL-", "MG", "CA", "ZN", "LI", "CS", "RB",
};

static ATOMIC_NUMBERS: Map<&'static str, u8> = phf_map! {
    "H" => 1, "HE" => 2, "LI" => 3, "B" => 5, "C" => 6, "N" => 7, "O" => 8, "F" => 9,
    "NA" => 11, "MG" => 12, "P" => 15, "S" => 16, "CL" => 17, "K" => 19, "CA" => 20,
    "FE" => 26, "CU" => 29, "ZN" => 30, "BR" => 35, "RB" => 37, "I" => 53, "CS" => 55,
};

// (atomic number, symbol, standard atomic weight in amu)
const ELEMENT_TABLE: &[(u8, &str, f64)] = &[
    (1, "H", 1.008),
    (2, "He", 4.0026),
    (3, "Li", 6.94),
    (5, "B", 10.81),
    (6, "C", 12.011),
    (7, "N", 14.007),
    (8, "O", 15.999),
    (9, "F", 18.998),
    (11, "Na", 22.990),
    (12, "Mg", 24.305),
    (15, "P", 30.974),
    (16, "S", 32.06),
    (17, "Cl", 35.45),
    (19, "K", 39.098),
    (20, "Ca", 40.078),
    (26, "Fe", 55.845),
    (29, "Cu", 63.546),
    (30, "Zn", 65.38),
    (35, "Br", 79.904),
    (37, "Rb", 85.468),
    (53, "I", 126.904),
    (55, "Cs", 132.905),
];

pub fn is_water_residue(residue_name: &str) -> bool {
    WATER_RESIDUE_NAMES.contains(residue_name.trim())
}

pub fn is_ion_residue(residue_name: &str) -> bool {
    ION_RESIDUE_NAMES.contains(residue_name.trim())
}

pub fn atomic_number_of(symbol: &str) -> Option<u8> {
    ATOMIC_NUMBERS
        .get(symbol.trim().to_ascii_uppercase().as_str())
        .copied()
}

pub fn element_symbol(atomic_number: u8) -> Option<&'static str> {
    ELEMENT_TABLE
        .iter()
        .find(|(n, _, _)| *n == atomic_number)
        .map(|(_, symbol, _)| *symbol)
}

pub fn nearest_element_by_mass(mass: f64) -> Option<i64> {
    ELEMENT_TABLE
        .iter()
        .min_by(|a, b| (a.2 - mass).abs().total_cmp(&(b.2 - mass).abs()))
        .filter(|(_, _, m)| (m - mass).abs() < 1.0)
        .map(|(n, _, _)| *n as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_water_residue_recognizes_common_water_names() {
        assert!(is_water_residue("HOH"));
        assert!(is_water_residue("WAT"));
        assert!(is_water_residue(" SOL "));
        assert!(is_water_residue("TIP3"));
    }

    #[test]
    fn is_water_residue_rejects_other_residues() {
        assert!(!is_water_residue("ALA"));
        assert!(!is_water_residue("hoh"));
        assert!(!is_water_residue(""));
    }

    #[test]
    fn is_ion_residue_recognizes_counter_ions() {
        assert!(is_ion_residue("Na+"));
        assert!(is_ion_residue("CL"));
        assert!(!is_ion_residue("WAT"));
    }

    #[test]
    fn atomic_number_of_is_case_insensitive() {
        assert_eq!(atomic_number_of("O"), Some(8));
        assert_eq!(atomic_number_of("cl"), Some(17));
        assert_eq!(atomic_number_of("Xx"), None);
    }

    #[test]
    fn element_symbol_round_trips_with_atomic_number() {
        assert_eq!(element_symbol(8), Some("O"));
        assert_eq!(element_symbol(17), Some("Cl"));
        assert_eq!(element_symbol(118), None);
    }

    #[test]
    fn nearest_element_by_mass_picks_closest_weight() {
        assert_eq!(nearest_element_by_mass(15.9994), Some(8));
        assert_eq!(nearest_element_by_mass(12.01), Some(6));
        assert_eq!(nearest_element_by_mass(35.453), Some(17));
        assert_eq!(nearest_element_by_mass(250.0), None);
    }
}
