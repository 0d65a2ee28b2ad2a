use crate::core::forcefield::params::{AngleType, BondType, ForceFieldParameters, LennardJonesTable, ParamError};
use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::{Atom, Element};
use crate::core::models::cell::{InvalidBoxError, PeriodicBox};
use crate::core::models::topology::{Angle, Bond, Topology, TopologyError};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Amber stores charges multiplied by √(332.0522173) so that Coulomb energies come out in
/// kcal/mol without a prefactor.
pub const AMBER_CHARGE_SCALE: f64 = 18.2223;

const KCAL_TO_KJ: f64 = 4.184;
const ANGSTROM_TO_NM: f64 = 0.1;

const POINTER_COUNT: usize = 31;
const NATOM: usize = 0;
const NTYPES: usize = 1;
const NBONH: usize = 2;
const MBONA: usize = 3;
const NTHETH: usize = 4;
const MTHETA: usize = 5;
const NPHIH: usize = 6;
const MPHIA: usize = 7;
const NNB: usize = 10;
const NRES: usize = 11;
const NBONA: usize = 12;
const NTHETA: usize = 13;
const NUMBND: usize = 15;
const NUMANG: usize = 16;
const NPTRA: usize = 17;
const NATYP: usize = 18;
const IFBOX: usize = 27;
const NMXRS: usize = 28;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrmtopMetadata {
    pub title: String,
    pub version: Option<String>,
    /// Periodic box from `BOX_DIMENSIONS`, in nm.
    pub periodic_box: Option<PeriodicBox>,
}

#[derive(Debug, Error)]
pub enum PrmtopError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: PrmtopParseErrorKind,
    },
    #[error("Missing required section: %FLAG {0}")]
    MissingSection(String),
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Unsupported topology feature: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Parameters(#[from] ParamError),
    #[error(transparent)]
    Box(#[from] InvalidBoxError),
}

#[derive(Debug, Error)]
pub enum PrmtopParseErrorKind {
    #[error("Invalid %FORMAT specification '{0}'")]
    InvalidFormat(String),
    #[error("Data line outside of any %FLAG section")]
    DataOutsideSection,
    #[error("%FLAG {0} has no %FORMAT line")]
    MissingFormat(String),
    #[error("Invalid integer '{value}' in section {section}")]
    InvalidInt { section: String, value: String },
    #[error("Invalid float '{value}' in section {section}")]
    InvalidFloat { section: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Integer,
    Float,
    Text,
}

/// A Fortran edit descriptor such as `10I8`, `5E16.8` or `20a4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FortranFormat {
    per_line: usize,
    kind: FieldKind,
    width: usize,
}

impl FortranFormat {
    fn parse(spec: &str) -> Option<Self> {
        let inner = spec.trim().trim_start_matches('(').trim_end_matches(')');
        let letter_pos = inner.find(|c: char| c.is_ascii_alphabetic())?;
        let per_line = if letter_pos == 0 {
            1
        } else {
            inner[..letter_pos].parse().ok()?
        };
        let kind = match inner[letter_pos..].chars().next()?.to_ascii_uppercase() {
            'I' => FieldKind::Integer,
            'E' | 'F' | 'D' | 'G' => FieldKind::Float,
            'A' => FieldKind::Text,
            _ => return None,
        };
        let width_str = inner[letter_pos + 1..].split('.').next()?;
        let width = width_str.parse().ok()?;
        if per_line == 0 || width == 0 {
            return None;
        }
        Some(Self {
            per_line,
            kind,
            width,
        })
    }
}

#[derive(Debug)]
struct Section {
    name: String,
    format: FortranFormat,
    first_line: usize,
    lines: Vec<String>,
}

impl Section {
    fn fields(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        let width = self.format.width;
        let per_line = self.format.per_line;
        let text = self.format.kind == FieldKind::Text;
        self.lines.iter().enumerate().flat_map(move |(offset, line)| {
            let line_num = self.first_line + offset;
            (0..per_line).filter_map(move |k| {
                let start = k * width;
                if start >= line.len() {
                    return None;
                }
                let end = (start + width).min(line.len());
                let field = line.get(start..end).unwrap_or("");
                if !text && field.trim().is_empty() {
                    return None;
                }
                Some((line_num, if text { field } else { field.trim() }))
            })
        })
    }

    fn integers(&self) -> Result<Vec<i64>, PrmtopError> {
        self.fields()
            .map(|(line, value)| {
                value.parse::<i64>().map_err(|_| PrmtopError::Parse {
                    line,
                    kind: PrmtopParseErrorKind::InvalidInt {
                        section: self.name.clone(),
                        value: value.to_string(),
                    },
                })
            })
            .collect()
    }

    fn floats(&self) -> Result<Vec<f64>, PrmtopError> {
        self.fields()
            .map(|(line, value)| {
                value
                    .replace(['D', 'd'], "E")
                    .parse::<f64>()
                    .map_err(|_| PrmtopError::Parse {
                        line,
                        kind: PrmtopParseErrorKind::InvalidFloat {
                            section: self.name.clone(),
                            value: value.to_string(),
                        },
                    })
            })
            .collect()
    }

    fn strings(&self) -> Vec<String> {
        self.fields().map(|(_, value)| value.trim().to_string()).collect()
    }
}

struct SectionTable {
    sections: HashMap<String, Section>,
    version: Option<String>,
}

impl SectionTable {
    fn read(reader: &mut impl BufRead) -> Result<Self, PrmtopError> {
        let mut sections: HashMap<String, Section> = HashMap::new();
        let mut version = None;
        let mut current: Option<(String, usize)> = None;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            if let Some(rest) = line.strip_prefix("%VERSION") {
                version = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("%FLAG") {
                current = Some((rest.trim().to_string(), line_num));
            } else if let Some(rest) = line.strip_prefix("%FORMAT") {
                let (name, _) = current.clone().ok_or(PrmtopError::Parse {
                    line: line_num,
                    kind: PrmtopParseErrorKind::DataOutsideSection,
                })?;
                let format = FortranFormat::parse(rest).ok_or_else(|| PrmtopError::Parse {
                    line: line_num,
                    kind: PrmtopParseErrorKind::InvalidFormat(rest.trim().to_string()),
                })?;
                sections.insert(
                    name.clone(),
                    Section {
                        name,
                        format,
                        first_line: line_num + 1,
                        lines: Vec::new(),
                    },
                );
            } else if line.starts_with("%COMMENT") {
                continue;
            } else {
                let Some((name, flag_line)) = current.as_ref() else {
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Err(PrmtopError::Parse {
                        line: line_num,
                        kind: PrmtopParseErrorKind::DataOutsideSection,
                    });
                };
                let section = sections.get_mut(name).ok_or_else(|| PrmtopError::Parse {
                    line: *flag_line,
                    kind: PrmtopParseErrorKind::MissingFormat(name.clone()),
                })?;
                section.lines.push(line);
            }
        }

        Ok(Self { sections, version })
    }

    fn get(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    fn require(&self, name: &str) -> Result<&Section, PrmtopError> {
        self.get(name)
            .ok_or_else(|| PrmtopError::MissingSection(name.to_string()))
    }

    fn integers(&self, name: &str, expected: usize) -> Result<Vec<i64>, PrmtopError> {
        let values = self.require(name)?.integers()?;
        check_len(name, &values, expected)?;
        Ok(values)
    }

    fn floats(&self, name: &str, expected: usize) -> Result<Vec<f64>, PrmtopError> {
        let values = self.require(name)?.floats()?;
        check_len(name, &values, expected)?;
        Ok(values)
    }

    fn strings(&self, name: &str, expected: usize) -> Result<Vec<String>, PrmtopError> {
        let mut values = self.require(name)?.strings();
        // Trailing blank a4 fields are indistinguishable from padding.
        values.truncate(expected.max(values.iter().rposition(|v| !v.is_empty()).map_or(0, |p| p + 1)));
        check_len(name, &values, expected)?;
        Ok(values)
    }

    /// Optional sections are only read when the pointer table says they carry data.
    fn optional_integers(&self, name: &str, expected: usize) -> Result<Vec<i64>, PrmtopError> {
        if expected == 0 {
            return Ok(Vec::new());
        }
        self.integers(name, expected)
    }

    fn optional_floats(&self, name: &str, expected: usize) -> Result<Vec<f64>, PrmtopError> {
        if expected == 0 {
            return Ok(Vec::new());
        }
        self.floats(name, expected)
    }
}

fn check_len<T>(name: &str, values: &[T], expected: usize) -> Result<(), PrmtopError> {
    if values.len() != expected {
        return Err(PrmtopError::Inconsistency(format!(
            "Section {} holds {} values, expected {}",
            name,
            values.len(),
            expected
        )));
    }
    Ok(())
}

fn to_index(value: i64, what: &str) -> Result<usize, PrmtopError> {
    usize::try_from(value)
        .map_err(|_| PrmtopError::Inconsistency(format!("Negative {} '{}'", what, value)))
}

/// Amber stores bond and angle atom indices pre-multiplied by three.
fn coordinate_index(value: i64) -> Result<usize, PrmtopError> {
    if value < 0 || value % 3 != 0 {
        return Err(PrmtopError::Inconsistency(format!(
            "Invalid coordinate-array index {} in bond/angle list",
            value
        )));
    }
    Ok((value / 3) as usize)
}

fn one_based(value: i64, what: &str) -> Result<usize, PrmtopError> {
    if value < 1 {
        return Err(PrmtopError::Inconsistency(format!(
            "{} index {} must be positive",
            what, value
        )));
    }
    Ok((value - 1) as usize)
}

/// Amber parameter/topology (`.prmtop`) files.
pub struct PrmtopFile;

impl PrmtopFile {
    fn build_topology(table: &SectionTable) -> Result<(Topology, PrmtopMetadata), PrmtopError> {
        let pointers = table.require("POINTERS")?.integers()?;
        if pointers.len() < NPTRA + 1 {
            return Err(PrmtopError::Inconsistency(format!(
                "POINTERS holds {} values, expected at least {}",
                pointers.len(),
                NPTRA + 1
            )));
        }
        let pointer = |i: usize, what: &str| to_index(pointers[i], what);

        let natom = pointer(NATOM, "atom count")?;
        let ntypes = pointer(NTYPES, "type count")?;
        let nbonh = pointer(NBONH, "bond count")?;
        let mbona = pointer(MBONA, "bond count")?;
        let ntheth = pointer(NTHETH, "angle count")?;
        let mtheta = pointer(MTHETA, "angle count")?;
        let nphih = pointer(NPHIH, "dihedral count")?;
        let mphia = pointer(MPHIA, "dihedral count")?;
        let nres = pointer(NRES, "residue count")?;
        let numbnd = pointer(NUMBND, "bond type count")?;
        let numang = pointer(NUMANG, "angle type count")?;
        let nptra = pointer(NPTRA, "dihedral type count")?;
        let ifbox = pointers.get(IFBOX).copied().unwrap_or(0);

        if nphih + mphia > 0 || nptra > 0 {
            return Err(PrmtopError::Unsupported(format!(
                "{} dihedral terms ({} types); torsions are not supported",
                nphih + mphia,
                nptra
            )));
        }

        let names = table.strings("ATOM_NAME", natom)?;
        let charges = table.floats("CHARGE", natom)?;
        let masses = table.floats("MASS", natom)?;
        let type_indices = table.integers("ATOM_TYPE_INDEX", natom)?;
        let nb_index = table.integers("NONBONDED_PARM_INDEX", ntypes * ntypes)?;
        let residue_labels = table.strings("RESIDUE_LABEL", nres)?;
        let residue_pointers = table.integers("RESIDUE_POINTER", nres)?;
        let n_pairs = ntypes * (ntypes + 1) / 2;
        let acoef = table.floats("LENNARD_JONES_ACOEF", n_pairs)?;
        let bcoef = table.floats("LENNARD_JONES_BCOEF", n_pairs)?;

        let amber_types = match table.get("AMBER_ATOM_TYPE") {
            Some(_) => table.strings("AMBER_ATOM_TYPE", natom)?,
            None => vec![String::new(); natom],
        };
        let atomic_numbers = match table.get("ATOMIC_NUMBER") {
            Some(_) => Some(table.integers("ATOMIC_NUMBER", natom)?),
            None => None,
        };

        let mut lennard_jones = LennardJonesTable::new(ntypes);
        for i in 0..ntypes {
            for j in i..ntypes {
                let ico = nb_index[i * ntypes + j];
                if ico < 0 {
                    return Err(PrmtopError::Unsupported(
                        "10-12 hydrogen-bond terms in NONBONDED_PARM_INDEX".to_string(),
                    ));
                }
                let k = one_based(ico, "NONBONDED_PARM_INDEX")?;
                if k >= n_pairs {
                    return Err(PrmtopError::Inconsistency(format!(
                        "NONBONDED_PARM_INDEX entry {} exceeds {} coefficient pairs",
                        ico, n_pairs
                    )));
                }
                lennard_jones.set(
                    i,
                    j,
                    acoef[k] * KCAL_TO_KJ * ANGSTROM_TO_NM.powi(12),
                    bcoef[k] * KCAL_TO_KJ * ANGSTROM_TO_NM.powi(6),
                )?;
            }
        }

        let bond_k = table.optional_floats("BOND_FORCE_CONSTANT", numbnd)?;
        let bond_r0 = table.optional_floats("BOND_EQUIL_VALUE", numbnd)?;
        let angle_k = table.optional_floats("ANGLE_FORCE_CONSTANT", numang)?;
        let angle_theta = table.optional_floats("ANGLE_EQUIL_VALUE", numang)?;

        let parameters = ForceFieldParameters {
            bond_types: bond_k
                .iter()
                .zip(&bond_r0)
                .map(|(&k, &r0)| BondType {
                    k: 2.0 * k * KCAL_TO_KJ / (ANGSTROM_TO_NM * ANGSTROM_TO_NM),
                    r0: r0 * ANGSTROM_TO_NM,
                })
                .collect(),
            angle_types: angle_k
                .iter()
                .zip(&angle_theta)
                .map(|(&k, &theta0)| AngleType {
                    k: 2.0 * k * KCAL_TO_KJ,
                    theta0,
                })
                .collect(),
            lennard_jones,
        };
        let mut topology = Topology::new(parameters);

        let mut residue_starts = residue_pointers
            .iter()
            .map(|&p| one_based(p, "RESIDUE_POINTER"))
            .collect::<Result<Vec<_>, _>>()?;
        if residue_starts.first().copied().unwrap_or(0) != 0 && natom > 0 {
            return Err(PrmtopError::Inconsistency(
                "RESIDUE_POINTER must start at atom 1".to_string(),
            ));
        }
        residue_starts.push(natom);
        for (r, window) in residue_starts.windows(2).enumerate() {
            let (start, end) = (window[0], window[1]);
            if start > end || end > natom {
                return Err(PrmtopError::Inconsistency(format!(
                    "Residue {} has invalid atom range {}..{}",
                    r + 1,
                    start + 1,
                    end
                )));
            }
            let atoms = (start..end)
                .map(|i| {
                    let mut atom = Atom::new(&names[i], r);
                    atom.force_field_type = amber_types[i].clone();
                    atom.charge = charges[i] / AMBER_CHARGE_SCALE;
                    atom.mass = masses[i];
                    atom.lj_type = one_based(type_indices[i], "ATOM_TYPE_INDEX")?;
                    atom.element = match &atomic_numbers {
                        Some(numbers) if numbers[i] > 0 => Element::from_atomic_number(numbers[i]),
                        _ => Element::from_mass(masses[i]),
                    };
                    Ok(atom)
                })
                .collect::<Result<Vec<_>, PrmtopError>>()?;
            topology.add_residue(&residue_labels[r], atoms);
        }

        for (name, count) in [
            ("BONDS_INC_HYDROGEN", nbonh),
            ("BONDS_WITHOUT_HYDROGEN", mbona),
        ] {
            let values = table.optional_integers(name, 3 * count)?;
            for chunk in values.chunks_exact(3) {
                topology.add_bond(
                    coordinate_index(chunk[0])?,
                    coordinate_index(chunk[1])?,
                    one_based(chunk[2], "bond type")?,
                )?;
            }
        }
        for (name, count) in [
            ("ANGLES_INC_HYDROGEN", ntheth),
            ("ANGLES_WITHOUT_HYDROGEN", mtheta),
        ] {
            let values = table.optional_integers(name, 4 * count)?;
            for chunk in values.chunks_exact(4) {
                topology.add_angle(
                    coordinate_index(chunk[0])?,
                    coordinate_index(chunk[1])?,
                    coordinate_index(chunk[2])?,
                    one_based(chunk[3], "angle type")?,
                )?;
            }
        }
        topology.validate()?;

        let periodic_box = if ifbox > 0 {
            let dims = table.floats("BOX_DIMENSIONS", 4)?;
            if (dims[0] - 90.0).abs() > 1e-3 {
                return Err(PrmtopError::Unsupported(format!(
                    "non-orthorhombic box (beta = {} degrees)",
                    dims[0]
                )));
            }
            Some(PeriodicBox::new(
                dims[1] * ANGSTROM_TO_NM,
                dims[2] * ANGSTROM_TO_NM,
                dims[3] * ANGSTROM_TO_NM,
            )?)
        } else {
            None
        };

        let title = table
            .get("TITLE")
            .or_else(|| table.get("CTITLE"))
            .map(|s| s.lines.join(" ").trim().to_string())
            .unwrap_or_default();

        Ok((
            topology,
            PrmtopMetadata {
                title,
                version: table.version.clone(),
                periodic_box,
            },
        ))
    }
}

impl MolecularFile for PrmtopFile {
    type Content = Topology;
    type Metadata = PrmtopMetadata;
    type Error = PrmtopError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Topology, PrmtopMetadata), PrmtopError> {
        let table = SectionTable::read(reader)?;
        Self::build_topology(&table)
    }

    fn write_to(
        topology: &Topology,
        metadata: &PrmtopMetadata,
        writer: &mut impl Write,
    ) -> Result<(), PrmtopError> {
        let atoms = topology.atoms();
        let natom = atoms.len();
        let lj = &topology.parameters.lennard_jones;
        let ntypes = lj.n_types();
        let is_hydrogen = |i: usize| atoms[i].element.is_hydrogen();

        let (bonds_h, bonds_heavy): (Vec<&Bond>, Vec<&Bond>) = topology
            .bonds()
            .iter()
            .partition(|b| is_hydrogen(b.atom1) || is_hydrogen(b.atom2));
        let (angles_h, angles_heavy): (Vec<&Angle>, Vec<&Angle>) = topology
            .angles()
            .iter()
            .partition(|a| is_hydrogen(a.atom1) || is_hydrogen(a.atom2) || is_hydrogen(a.atom3));

        let mut excluded: Vec<Vec<usize>> = vec![Vec::new(); natom];
        for (i, j) in topology.excluded_pairs() {
            excluded[i].push(j);
        }
        let exclusion_list: Vec<i64> = excluded
            .iter()
            .flat_map(|list| {
                if list.is_empty() {
                    vec![0]
                } else {
                    list.iter().map(|&j| j as i64 + 1).collect()
                }
            })
            .collect();

        let max_residue = topology.residues().iter().map(|r| r.len()).max().unwrap_or(0);
        let mut pointers = [0i64; POINTER_COUNT];
        pointers[NATOM] = natom as i64;
        pointers[NTYPES] = ntypes as i64;
        pointers[NBONH] = bonds_h.len() as i64;
        pointers[MBONA] = bonds_heavy.len() as i64;
        pointers[NTHETH] = angles_h.len() as i64;
        pointers[MTHETA] = angles_heavy.len() as i64;
        pointers[NNB] = exclusion_list.len() as i64;
        pointers[NRES] = topology.residue_count() as i64;
        pointers[NBONA] = bonds_heavy.len() as i64;
        pointers[NTHETA] = angles_heavy.len() as i64;
        pointers[NUMBND] = topology.parameters.bond_types.len() as i64;
        pointers[NUMANG] = topology.parameters.angle_types.len() as i64;
        pointers[NATYP] = ntypes as i64;
        pointers[IFBOX] = i64::from(metadata.periodic_box.is_some());
        pointers[NMXRS] = max_residue as i64;

        writeln!(
            writer,
            "%VERSION {}",
            metadata
                .version
                .as_deref()
                .unwrap_or("VERSION_STAMP = V0001.000")
        )?;
        write_text(writer, "TITLE", 1, 80, std::iter::once(metadata.title.as_str()))?;
        write_ints(writer, "POINTERS", pointers.iter().copied())?;
        write_text(writer, "ATOM_NAME", 20, 4, atoms.iter().map(|a| a.name.as_str()))?;
        write_floats(writer, "CHARGE", atoms.iter().map(|a| a.charge * AMBER_CHARGE_SCALE))?;
        write_ints(
            writer,
            "ATOMIC_NUMBER",
            atoms
                .iter()
                .map(|a| a.element.atomic_number().map_or(-1, i64::from)),
        )?;
        write_floats(writer, "MASS", atoms.iter().map(|a| a.mass))?;
        write_ints(writer, "ATOM_TYPE_INDEX", atoms.iter().map(|a| a.lj_type as i64 + 1))?;
        write_ints(
            writer,
            "NUMBER_EXCLUDED_ATOMS",
            excluded.iter().map(|list| list.len().max(1) as i64),
        )?;

        let pair_index = |i: usize, j: usize| {
            let (lo, hi) = (i.min(j), i.max(j));
            hi * (hi + 1) / 2 + lo + 1
        };
        write_ints(
            writer,
            "NONBONDED_PARM_INDEX",
            (0..ntypes).flat_map(|i| (0..ntypes).map(move |j| pair_index(i, j) as i64)),
        )?;
        write_text(
            writer,
            "RESIDUE_LABEL",
            20,
            4,
            topology.residues().iter().map(|r| r.name.as_str()),
        )?;
        write_ints(
            writer,
            "RESIDUE_POINTER",
            topology.residues().iter().map(|r| r.first_atom() as i64 + 1),
        )?;

        let bond_types = &topology.parameters.bond_types;
        write_floats(
            writer,
            "BOND_FORCE_CONSTANT",
            bond_types
                .iter()
                .map(|b| b.k * ANGSTROM_TO_NM * ANGSTROM_TO_NM / (2.0 * KCAL_TO_KJ)),
        )?;
        write_floats(
            writer,
            "BOND_EQUIL_VALUE",
            bond_types.iter().map(|b| b.r0 / ANGSTROM_TO_NM),
        )?;
        let angle_types = &topology.parameters.angle_types;
        write_floats(
            writer,
            "ANGLE_FORCE_CONSTANT",
            angle_types.iter().map(|a| a.k / (2.0 * KCAL_TO_KJ)),
        )?;
        write_floats(writer, "ANGLE_EQUIL_VALUE", angle_types.iter().map(|a| a.theta0))?;

        let lower_triangle: Vec<(f64, f64)> = (0..ntypes)
            .flat_map(|hi| (0..=hi).map(move |lo| (lo, hi)))
            .map(|(lo, hi)| lj.coefficients(lo, hi))
            .collect();
        write_floats(
            writer,
            "LENNARD_JONES_ACOEF",
            lower_triangle
                .iter()
                .map(|(a, _)| a / (KCAL_TO_KJ * ANGSTROM_TO_NM.powi(12))),
        )?;
        write_floats(
            writer,
            "LENNARD_JONES_BCOEF",
            lower_triangle
                .iter()
                .map(|(_, b)| b / (KCAL_TO_KJ * ANGSTROM_TO_NM.powi(6))),
        )?;

        for (name, bonds) in [
            ("BONDS_INC_HYDROGEN", &bonds_h),
            ("BONDS_WITHOUT_HYDROGEN", &bonds_heavy),
        ] {
            write_ints(
                writer,
                name,
                bonds.iter().flat_map(|b| {
                    [
                        3 * b.atom1 as i64,
                        3 * b.atom2 as i64,
                        b.type_index as i64 + 1,
                    ]
                }),
            )?;
        }
        for (name, angles) in [
            ("ANGLES_INC_HYDROGEN", &angles_h),
            ("ANGLES_WITHOUT_HYDROGEN", &angles_heavy),
        ] {
            write_ints(
                writer,
                name,
                angles.iter().flat_map(|a| {
                    [
                        3 * a.atom1 as i64,
                        3 * a.atom2 as i64,
                        3 * a.atom3 as i64,
                        a.type_index as i64 + 1,
                    ]
                }),
            )?;
        }
        write_ints(writer, "EXCLUDED_ATOMS_LIST", exclusion_list.into_iter())?;
        write_text(
            writer,
            "AMBER_ATOM_TYPE",
            20,
            4,
            atoms.iter().map(|a| a.force_field_type.as_str()),
        )?;

        if let Some(periodic_box) = &metadata.periodic_box {
            let l = periodic_box.lengths() / ANGSTROM_TO_NM;
            write_floats(writer, "BOX_DIMENSIONS", [90.0, l.x, l.y, l.z].into_iter())?;
        }
        Ok(())
    }
}

/// Formats a value like Fortran's `E16.8` (`-1.23456789E+00`).
fn fortran_exponential(value: f64) -> String {
    let formatted = format!("{:.8E}", value);
    let (mantissa, exponent) = formatted.split_once('E').unwrap_or((formatted.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{:>16}", format!("{}E{}{:02}", mantissa, sign, exponent.abs()))
}

fn write_lines<I>(writer: &mut impl Write, flag: &str, format: &str, per_line: usize, items: I) -> io::Result<()>
where
    I: Iterator<Item = String>,
{
    writeln!(writer, "%FLAG {:<74}", flag)?;
    writeln!(writer, "%FORMAT({})", format)?;
    let mut line = String::new();
    let mut count = 0;
    for item in items {
        line.push_str(&item);
        count += 1;
        if count % per_line == 0 {
            writeln!(writer, "{}", line)?;
            line.clear();
        }
    }
    if !line.is_empty() || count == 0 {
        writeln!(writer, "{}", line)?;
    }
    Ok(())
}

fn write_ints(writer: &mut impl Write, flag: &str, values: impl Iterator<Item = i64>) -> io::Result<()> {
    write_lines(writer, flag, "10I8", 10, values.map(|v| format!("{:>8}", v)))
}

fn write_floats(writer: &mut impl Write, flag: &str, values: impl Iterator<Item = f64>) -> io::Result<()> {
    write_lines(writer, flag, "5E16.8", 5, values.map(fortran_exponential))
}

fn write_text<'a>(
    writer: &mut impl Write,
    flag: &str,
    per_line: usize,
    width: usize,
    values: impl Iterator<Item = &'a str>,
) -> io::Result<()> {
    let format = format!("{}a{}", per_line, width);
    write_lines(
        writer,
        flag,
        &format,
        per_line,
        values.map(|v| {
            let truncated: String = v.chars().take(width).collect();
            format!("{:<width$}", truncated, width = width)
        }),
    )
}
