use crate::core::io::traits::StructureFile;
use crate::core::models::element::Element;
use crate::core::models::structure::{Atom, InfoValue, Structure};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const UNIQUE_ID_KEY: &str = "unique_id";
const NEIGHBORLIST_KEY: &str = "neighborlist";

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
}

#[derive(Debug, Error, PartialEq)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidCount(String),
    #[error("Invalid coordinate '{0}'")]
    InvalidFloat(String),
    #[error("Unknown element '{0}'")]
    UnknownElement(String),
    #[error("Atom line needs a symbol and three coordinates")]
    ShortAtomLine,
    #[error("Frame ended after {found} of {expected} atoms")]
    TruncatedFrame { expected: usize, found: usize },
    #[error("Malformed key/value pair: {0}")]
    MalformedInfo(String),
    #[error("Invalid neighbour list: {0}")]
    InvalidNeighborList(String),
}

fn parse_error(line: usize, kind: XyzParseErrorKind) -> XyzError {
    XyzError::Parse { line, kind }
}

/// Extended XYZ: atom count, a `key=value` comment line, then one atom per line.
pub struct XyzFile;

impl StructureFile for XyzFile {
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Structure>, Self::Error> {
        let mut lines = reader
            .lines()
            .enumerate()
            .map(|(i, l)| l.map(|content| (i + 1, content)));
        let mut structures = Vec::new();

        loop {
            let (count_line, count_str) = match next_non_blank(&mut lines)? {
                Some(entry) => entry,
                None => break,
            };
            let count: usize = count_str.trim().parse().map_err(|_| {
                parse_error(
                    count_line,
                    XyzParseErrorKind::InvalidCount(count_str.trim().to_string()),
                )
            })?;

            let (comment_line, comment) = match lines.next().transpose()? {
                Some(entry) => entry,
                None => {
                    return Err(parse_error(
                        count_line,
                        XyzParseErrorKind::TruncatedFrame {
                            expected: count,
                            found: 0,
                        },
                    ));
                }
            };
            let info = parse_info_line(&comment)
                .map_err(|kind| parse_error(comment_line, kind))?;

            let mut atoms = Vec::with_capacity(count);
            let mut last_line = comment_line;
            for found in 0..count {
                let (line_num, content) = match lines.next().transpose()? {
                    Some(entry) => entry,
                    None => {
                        return Err(parse_error(
                            last_line,
                            XyzParseErrorKind::TruncatedFrame {
                                expected: count,
                                found,
                            },
                        ));
                    }
                };
                last_line = line_num;
                atoms.push(parse_atom_line(&content).map_err(|kind| parse_error(line_num, kind))?);
            }

            let default_id = format!("frame-{}", structures.len());
            let mut structure = Structure::with_atoms(&default_id, atoms);
            for (key, value) in info {
                match (key.as_str(), value) {
                    (UNIQUE_ID_KEY, InfoValue::Text(id)) => structure.set_unique_id(&id),
                    (NEIGHBORLIST_KEY, InfoValue::Text(raw)) => {
                        let invalid = |message: String| {
                            parse_error(comment_line, XyzParseErrorKind::InvalidNeighborList(message))
                        };
                        let neighbors = parse_neighborlist(&raw, count).map_err(invalid)?;
                        structure
                            .set_neighborlist(neighbors)
                            .map_err(|e| invalid(e.to_string()))?;
                    }
                    (NEIGHBORLIST_KEY, _) => {
                        return Err(parse_error(
                            comment_line,
                            XyzParseErrorKind::InvalidNeighborList(
                                "expected per-atom index lists".to_string(),
                            ),
                        ));
                    }
                    (_, value) => structure.set_info(&key, value),
                }
            }
            structures.push(structure);
        }

        Ok(structures)
    }

    fn write_to(structures: &[Structure], writer: &mut impl Write) -> Result<(), Self::Error> {
        for structure in structures {
            writeln!(writer, "{}", structure.len())?;

            let mut comment = format!(
                "{}={}",
                UNIQUE_ID_KEY,
                InfoValue::Text(structure.unique_id().to_string())
            );
            for (key, value) in structure.info() {
                comment.push_str(&format!(" {}={}", key, value));
            }
            if let Some(neighbors) = structure.neighborlist() {
                comment.push_str(&format!(
                    " {}={}",
                    NEIGHBORLIST_KEY,
                    InfoValue::Text(format_neighborlist(neighbors))
                ));
            }
            writeln!(writer, "{}", comment)?;

            for (atom, symbol) in structure.atoms().iter().zip(structure.symbols()) {
                writeln!(
                    writer,
                    "{:<2} {:>16.8} {:>16.8} {:>16.8}",
                    symbol, atom.position.x, atom.position.y, atom.position.z
                )?;
            }
        }
        Ok(())
    }
}

fn next_non_blank(
    lines: &mut impl Iterator<Item = io::Result<(usize, String)>>,
) -> Result<Option<(usize, String)>, XyzError> {
    for entry in lines {
        let (line_num, content) = entry?;
        if !content.trim().is_empty() {
            return Ok(Some((line_num, content)));
        }
    }
    Ok(None)
}

fn parse_atom_line(line: &str) -> Result<Atom, XyzParseErrorKind> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(XyzParseErrorKind::ShortAtomLine);
    }

    let element = match fields[0].parse::<u8>() {
        Ok(number) => Element::by_number(number),
        Err(_) => Element::by_symbol(fields[0]),
    }
    .map_err(|_| XyzParseErrorKind::UnknownElement(fields[0].to_string()))?;

    let mut coords = [0.0; 3];
    for (slot, raw) in coords.iter_mut().zip(&fields[1..4]) {
        *slot = raw
            .parse()
            .map_err(|_| XyzParseErrorKind::InvalidFloat(raw.to_string()))?;
    }

    Ok(Atom::new(
        element.number,
        Point3::new(coords[0], coords[1], coords[2]),
    ))
}

/// Decodes `1,2;0;0`: one `;`-separated entry per atom, each a `,`-separated index list.
fn parse_neighborlist(raw: &str, atoms: usize) -> Result<Vec<Vec<usize>>, String> {
    if atoms == 0 && raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(';')
        .map(|entry| {
            if entry.is_empty() {
                return Ok(Vec::new());
            }
            entry
                .split(',')
                .map(|index| {
                    index
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| format!("'{}' is not an atom index", index))
                })
                .collect()
        })
        .collect()
}

fn format_neighborlist(neighbors: &[Vec<usize>]) -> String {
    neighbors
        .iter()
        .map(|row| row.iter().map(|j| j.to_string()).collect::<Vec<_>>().join(","))
        .collect::<Vec<_>>()
        .join(";")
}

/// Splits a comment line into `key=value` pairs.
///
/// Values may be double-quoted to include whitespace. A bare key is a boolean flag.
fn parse_info_line(line: &str) -> Result<Vec<(String, InfoValue)>, XyzParseErrorKind> {
    let mut pairs = Vec::new();
    let mut chars = line.trim().chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '=') {
            key.push(c);
        }
        if key.is_empty() {
            return Err(XyzParseErrorKind::MalformedInfo(line.trim().to_string()));
        }

        if chars.next_if_eq(&'=').is_none() {
            pairs.push((key, InfoValue::Bool(true)));
            continue;
        }

        let value = if chars.next_if_eq(&'"').is_some() {
            let mut quoted = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                quoted.push(c);
            }
            if !closed {
                return Err(XyzParseErrorKind::MalformedInfo(format!(
                    "unterminated quote for key '{}'",
                    key
                )));
            }
            InfoValue::Text(quoted)
        } else {
            let mut raw = String::new();
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                raw.push(c);
            }
            if raw.is_empty() {
                return Err(XyzParseErrorKind::MalformedInfo(format!(
                    "missing value for key '{}'",
                    key
                )));
            }
            if key == UNIQUE_ID_KEY || key == NEIGHBORLIST_KEY {
                InfoValue::Text(raw)
            } else {
                InfoValue::parse(&raw)
            }
        };
        pairs.push((key, value));
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::graph::connection_matrix;
    use std::io::Cursor;

    const TWO_FRAMES: &str = "\
3
unique_id=water energy=-14.2 note=\"relaxed geometry\" converged
O  0.0 0.0 0.0
H  0.757 0.586 0.0
H -0.757 0.586 0.0

2
energy=-31.5
6 0.0 0.0 0.0
8 0.0 0.0 1.128
";

    #[test]
    fn read_from_parses_multiple_frames() {
        let structures = XyzFile::read_from(&mut Cursor::new(TWO_FRAMES)).unwrap();
        assert_eq!(structures.len(), 2);

        let water = &structures[0];
        assert_eq!(water.unique_id(), "water");
        assert_eq!(water.numbers(), vec![8, 1, 1]);
        assert_eq!(water.target("energy"), Some(-14.2));
        assert_eq!(
            water.info_value("note"),
            Some(&InfoValue::Text("relaxed geometry".into()))
        );
        assert_eq!(water.info_value("converged"), Some(&InfoValue::Bool(true)));

        let co = &structures[1];
        assert_eq!(co.unique_id(), "frame-1");
        assert_eq!(co.symbols(), vec!["C", "O"]);
        assert!((co.distance(0, 1) - 1.128).abs() < 1e-12);
    }

    #[test]
    fn read_from_reports_truncated_frames() {
        let input = "3\nenergy=1.0\nH 0 0 0\nH 0 0 1\n";
        let err = XyzFile::read_from(&mut Cursor::new(input)).unwrap_err();
        match err {
            XyzError::Parse { line, kind } => {
                assert_eq!(line, 4);
                assert_eq!(
                    kind,
                    XyzParseErrorKind::TruncatedFrame {
                        expected: 3,
                        found: 2
                    }
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn read_from_reports_bad_tokens_with_line_numbers() {
        let bad_count = "two\n\n";
        assert!(matches!(
            XyzFile::read_from(&mut Cursor::new(bad_count)),
            Err(XyzError::Parse {
                line: 1,
                kind: XyzParseErrorKind::InvalidCount(_)
            })
        ));

        let bad_coord = "1\n\nH 0.0 abc 0.0\n";
        assert!(matches!(
            XyzFile::read_from(&mut Cursor::new(bad_coord)),
            Err(XyzError::Parse {
                line: 3,
                kind: XyzParseErrorKind::InvalidFloat(_)
            })
        ));

        let bad_element = "1\n\nQq 0.0 0.0 0.0\n";
        assert!(matches!(
            XyzFile::read_from(&mut Cursor::new(bad_element)),
            Err(XyzError::Parse {
                line: 3,
                kind: XyzParseErrorKind::UnknownElement(_)
            })
        ));
    }

    #[test]
    fn parse_info_line_rejects_unterminated_quotes() {
        assert!(matches!(
            parse_info_line("name=\"open"),
            Err(XyzParseErrorKind::MalformedInfo(_))
        ));
        assert!(matches!(
            parse_info_line("=5"),
            Err(XyzParseErrorKind::MalformedInfo(_))
        ));
    }

    #[test]
    fn written_frames_read_back_identically() {
        let original = XyzFile::read_from(&mut Cursor::new(TWO_FRAMES)).unwrap();
        let mut buffer = Vec::new();
        XyzFile::write_to(&original, &mut buffer).unwrap();

        let reread = XyzFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(reread[0].unique_id(), "water");
        assert_eq!(reread[1].unique_id(), "frame-1");
        assert_eq!(reread[0].target("energy"), Some(-14.2));
        assert_eq!(
            reread[0].info_value("note"),
            Some(&InfoValue::Text("relaxed geometry".into()))
        );
        assert!((reread[0].atoms()[1].position.x - 0.757).abs() < 1e-8);
    }

    const BENT_CHAIN: &str = "\
3
unique_id=chain neighborlist=1;0,2;1
C 0.0 0.0 0.0
C 5.0 0.0 0.0
C 10.0 0.0 0.0
";

    #[test]
    fn neighborlist_key_drives_the_connection_matrix() {
        let structures = XyzFile::read_from(&mut Cursor::new(BENT_CHAIN)).unwrap();
        let chain = &structures[0];
        assert_eq!(
            chain.neighborlist(),
            Some(&[vec![1], vec![0, 2], vec![1]][..])
        );
        assert!(chain.info_value("neighborlist").is_none());

        // Atoms 5 A apart are never bonded by covalent radii, so every bond comes from
        // the stored list.
        let cm = connection_matrix(chain, 0.2).unwrap();
        assert_eq!(cm.sum(), 4.0);
        assert_eq!(cm[(0, 1)], 1.0);
        assert_eq!(cm[(1, 2)], 1.0);
        assert_eq!(cm[(0, 2)], 0.0);
    }

    #[test]
    fn neighborlist_survives_a_write_and_read() {
        let original = XyzFile::read_from(&mut Cursor::new(BENT_CHAIN)).unwrap();
        let mut buffer = Vec::new();
        XyzFile::write_to(&original, &mut buffer).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.contains("neighborlist=1;0,2;1"));

        let reread = XyzFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(reread[0].neighborlist(), original[0].neighborlist());
    }

    #[test]
    fn isolated_atoms_keep_empty_neighbour_entries() {
        let input = "2\nneighborlist=\";\"\nH 0 0 0\nH 0 0 9\n";
        let structures = XyzFile::read_from(&mut Cursor::new(input)).unwrap();
        assert_eq!(structures[0].neighborlist(), Some(&[vec![], vec![]][..]));
    }

    #[test]
    fn malformed_neighborlists_are_rejected_with_the_comment_line() {
        for comment in [
            "neighborlist=1;0;9",
            "neighborlist=1;x;1",
            "neighborlist=1;0",
            "neighborlist",
        ] {
            let input = format!("3\n{}\nC 0 0 0\nC 1 0 0\nC 2 0 0\n", comment);
            assert!(
                matches!(
                    XyzFile::read_from(&mut Cursor::new(input)),
                    Err(XyzError::Parse {
                        line: 2,
                        kind: XyzParseErrorKind::InvalidNeighborList(_)
                    })
                ),
                "accepted {comment}"
            );
        }
    }

    #[test]
    fn info_values_keep_their_kind_across_a_write() {
        let mut s = Structure::with_atoms("kinds", vec![Atom::new(1, Point3::origin())]);
        s.set_info("label", InfoValue::Text("3".into()));
        s.set_info("flag", InfoValue::Text("T".into()));
        s.set_info("energy", InfoValue::Float(-1.234567890123456));
        s.set_info("count", InfoValue::Int(4));

        let mut buffer = Vec::new();
        XyzFile::write_to(&[s.clone()], &mut buffer).unwrap();
        let reread = XyzFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(reread[0].info(), s.info());
    }

    #[test]
    fn path_helpers_use_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.xyz");
        let original = XyzFile::read_from(&mut Cursor::new(TWO_FRAMES)).unwrap();

        XyzFile::write_to_path(&original, &path).unwrap();
        let reread = XyzFile::read_from_path(&path).unwrap();
        assert_eq!(reread.len(), original.len());
    }
}
