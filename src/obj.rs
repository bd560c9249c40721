use std::io::{ BufRead, BufReader };
use std::path::Path;
use std::fs::File;
use std::collections::BTreeMap;

use log::{ debug, warn };

use crate::error::{ Result, TracerError };
use crate::tuple::Tuple4D;
use crate::shape::{ Shape, ShapeId, Shapes };

/// One vertex of a face: a vertex index and an optional normal index, both
/// zero-based once parsed.
type ObjFaceVertex = (usize, Option<usize>);

/// A parser for Wavefront OBJ meshes.
///
/// Only vertices, vertex normals, faces and named groups are understood.
/// Faces are stored as triangles, grouped by the `g` record they followed.
#[derive(Clone, Debug, Default)]
pub struct ObjParser {
    pub ignored_lines: usize,

    pub vertices: Vec<Tuple4D>,
    pub normals: Vec<Tuple4D>,

    /// Triangles of each group. The default group is keyed by `""`.
    pub groups: BTreeMap<String, Vec<Shape>>,
}

impl ObjParser {
    /// Parses an OBJ document.
    ///
    /// Unsupported records are skipped, and each one increments
    /// `ignored_lines`. Blank lines are skipped without being counted.
    ///
    /// A sample document may look like the following:
    ///
    /// ```obj
    /// v -1 1 0
    /// v -1 0 0
    /// v 1 0 0
    /// v 1 1 0
    ///
    /// g FirstGroup
    /// f 1 2 3
    /// g SecondGroup
    /// f 1 3 4
    /// ```
    ///
    /// Groups do not nest; `SecondGroup` above is a sibling of `FirstGroup`.
    pub fn parse<R: BufRead>(reader: R) -> Result<ObjParser> {
        let mut parser = ObjParser::default();
        parser.groups.insert(String::new(), Vec::new());

        let mut current_group = String::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            parser.handle_record(n + 1, &line, &mut current_group)?;
        }

        debug!("parsed OBJ: {} vertices, {} normals, {} triangles, {} ignored lines",
            parser.vertices.len(), parser.normals.len(),
            parser.triangle_count(), parser.ignored_lines);

        Ok(parser)
    }

    /// Opens and parses the OBJ file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ObjParser> {
        let path = path.as_ref();
        debug!("loading mesh {}", path.display());

        Self::parse(BufReader::new(File::open(path)?))
    }

    /// Total number of triangles across all groups.
    pub fn triangle_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// The triangles of the default group.
    pub fn default_group(&self) -> &[Shape] {
        self.groups.get("").map(Vec::as_slice).unwrap_or(&[])
    }

    fn handle_record(&mut self, line_no: usize, line: &str,
        current_group: &mut String) -> Result<()> {
        let mut params = line.split_whitespace();
        let command = match params.next() {
            Some(c) => c,
            None => return Ok(()),
        };
        let args: Vec<&str> = params.collect();

        match command {
            "v" => {
                let [x, y, z] = parse_xyz(line_no, &args)?;
                self.vertices.push(Tuple4D::point(x, y, z));
            },

            "vn" => {
                let [x, y, z] = parse_xyz(line_no, &args)?;
                self.normals.push(Tuple4D::vector(x, y, z));
            },

            "f" => {
                let face = args.iter()
                    .map(|element| self.parse_face_vertex(line_no, element))
                    .collect::<Result<Vec<_>>>()?;

                if face.len() < 3 {
                    return Err(TracerError::Obj {
                        line: line_no,
                        message: format!("face has {} vertices, need at least 3",
                            face.len()),
                    });
                }

                let triangles = self.fan_triangulation(line_no, &face);
                self.groups.entry(current_group.clone())
                    .or_default()
                    .extend(triangles);
            },

            "g" if !args.is_empty() => {
                *current_group = args.join(" ");
                self.groups.entry(current_group.clone()).or_default();
            },

            _ => {
                debug!("OBJ line {}: ignoring '{}'", line_no, line.trim());
                self.ignored_lines += 1;
            },
        }

        Ok(())
    }

    /// Parses a face element of the form `v`, `v/vt`, `v/vt/vn` or `v//vn`.
    ///
    /// Texture indices are validated as numbers but otherwise unused.
    fn parse_face_vertex(&self, line_no: usize, element: &str)
        -> Result<ObjFaceVertex> {
        let mut attributes = element.split('/');

        let vertex = attributes.next().unwrap_or("");
        let vertex = parse_index(line_no, vertex, self.vertices.len(), "vertex")?;

        if let Some(texture) = attributes.next() {
            if !texture.is_empty() && texture.parse::<usize>().is_err() {
                return Err(TracerError::Obj {
                    line: line_no,
                    message: format!("invalid texture index '{}'", texture),
                });
            }
        }

        let normal = match attributes.next() {
            Some(n) if !n.is_empty() =>
                Some(parse_index(line_no, n, self.normals.len(), "normal")?),
            _ => None,
        };

        if attributes.next().is_some() {
            return Err(TracerError::Obj {
                line: line_no,
                message: format!("malformed face element '{}'", element),
            });
        }

        Ok((vertex, normal))
    }

    /// Partitions a polygon into triangles.
    ///
    /// ```text
    ///         B *
    ///          / \
    ///         /   \
    ///        /     \
    ///     A *       * C
    ///       |       |
    ///       |       |
    ///     E * ----- * D
    /// ```
    ///
    /// Starting at `A`, the polygon becomes `A-B-C`, `A-C-D` and `A-D-E`.
    /// When every vertex of the face names a normal the triangles are
    /// smooth; otherwise they are flat.
    fn fan_triangulation(&self, line_no: usize, face: &[ObjFaceVertex])
        -> Vec<Shape> {
        let normals: Option<Vec<usize>> = face.iter().map(|&(_, n)| n).collect();
        if normals.is_none() && face.iter().any(|&(_, n)| n.is_some()) {
            warn!("OBJ line {}: some face vertices lack normals, using a flat face",
                line_no);
        }

        let v = |i: usize| self.vertices[face[i].0];
        (1..face.len() - 1).map(|i| match normals {
            Some(ref n) => Shape::smooth_triangle(
                v(0), v(i), v(i + 1),
                self.normals[n[0]], self.normals[n[i]], self.normals[n[i + 1]],
            ),
            None => Shape::triangle(v(0), v(i), v(i + 1)),
        }).collect()
    }

    /// Moves the mesh into `shapes` under a new root group.
    ///
    /// Triangles of the default group become children of the root, and each
    /// named group becomes a child group of the root holding its triangles.
    pub fn into_group(self, shapes: &mut Shapes) -> Result<ShapeId> {
        let root = shapes.insert(Shape::group());

        for (name, triangles) in self.groups {
            let parent = if name.is_empty() {
                root
            } else {
                let group = shapes.insert(Shape::group());
                shapes.add_child(root, group)?;
                group
            };

            for triangle in triangles {
                let id = shapes.insert(triangle);
                shapes.add_child(parent, id)?;
            }
        }

        Ok(root)
    }
}

fn parse_xyz(line_no: usize, args: &[&str]) -> Result<[f64; 3]> {
    if args.len() < 3 {
        return Err(TracerError::Obj {
            line: line_no,
            message: format!("expected 3 coordinates, found {}", args.len()),
        });
    }

    let mut xyz = [0.0; 3];
    for (c, arg) in xyz.iter_mut().zip(args) {
        *c = arg.parse().map_err(|_| TracerError::Obj {
            line: line_no,
            message: format!("invalid number '{}'", arg),
        })?;
    }

    Ok(xyz)
}

/// Converts a one-based OBJ index into a zero-based one, checking it
/// against the number of records seen so far.
fn parse_index(line_no: usize, s: &str, count: usize, what: &str)
    -> Result<usize> {
    let index: usize = s.parse().map_err(|_| TracerError::Obj {
        line: line_no,
        message: format!("invalid {} index '{}'", what, s),
    })?;

    if index == 0 || index > count {
        return Err(TracerError::Obj {
            line: line_no,
            message: format!("{} index {} out of range (have {})", what, index, count),
        });
    }

    Ok(index - 1)
}

#[cfg(test)]
use std::io::Cursor;
#[cfg(test)]
use crate::shape::{ ShapeType, TriangleInfo, SmoothTriangleInfo };

#[cfg(test)]
fn parse_str(s: &str) -> Result<ObjParser> {
    ObjParser::parse(Cursor::new(s))
}

#[cfg(test)]
fn triangle_info(s: &Shape) -> TriangleInfo {
    match s.ty() {
        ShapeType::Triangle(t) => *t,
        other => panic!("expected a triangle, got {:?}", other),
    }
}

#[cfg(test)]
fn smooth_triangle_info(s: &Shape) -> SmoothTriangleInfo {
    match s.ty() {
        ShapeType::SmoothTriangle(t) => *t,
        other => panic!("expected a smooth triangle, got {:?}", other),
    }
}

#[test]
fn ignoring_unrecognized_lines() {
    let gibberish = "There was a young lady named Bright\n\
        who traveled much faster than light.\n\
        She set out one day\n\
        in a relative way,\n\
        and came back the previous night.\n";
    let obj_parser = parse_str(gibberish).unwrap();

    assert_eq!(obj_parser.ignored_lines, 5);
    assert_eq!(obj_parser.triangle_count(), 0);
}

#[test]
fn vertex_records() {
    let obj_parser = parse_str("v -1 1 0\nv -1.0000 0.5000 0.0000\nv 1 0 0\nv 1 1 0\n")
        .unwrap();

    assert_eq!(obj_parser.vertices[0], Tuple4D::point(-1.0, 1.0, 0.0));
    assert_eq!(obj_parser.vertices[1], Tuple4D::point(-1.0, 0.5, 0.0));
    assert_eq!(obj_parser.vertices[2], Tuple4D::point( 1.0, 0.0, 0.0));
    assert_eq!(obj_parser.vertices[3], Tuple4D::point( 1.0, 1.0, 0.0));
}

#[test]
fn parsing_triangle_faces() {
    let obj_parser = parse_str("v -1 1 0\nv -1 0 0\nv 1 0 0\nv 1 1 0\n\nf 1 2 3\nf 1 3 4\n")
        .unwrap();

    let children = obj_parser.default_group();
    let t1 = triangle_info(&children[0]);
    let t2 = triangle_info(&children[1]);

    assert_eq!(t1.p1, obj_parser.vertices[0]);
    assert_eq!(t1.p2, obj_parser.vertices[1]);
    assert_eq!(t1.p3, obj_parser.vertices[2]);
    assert_eq!(t2.p1, obj_parser.vertices[0]);
    assert_eq!(t2.p2, obj_parser.vertices[2]);
    assert_eq!(t2.p3, obj_parser.vertices[3]);
}

#[test]
fn triangulating_polygons() {
    let obj_parser = parse_str(
        "v -1 1 0\nv -1 0 0\nv 1 0 0\nv 1 1 0\nv 0 2 0\n\nf 1 2 3 4 5\n"
    ).unwrap();

    let children = obj_parser.default_group();
    assert_eq!(children.len(), 3);

    let t1 = triangle_info(&children[0]);
    let t2 = triangle_info(&children[1]);
    let t3 = triangle_info(&children[2]);

    assert_eq!(t1.p1, obj_parser.vertices[0]);
    assert_eq!(t1.p2, obj_parser.vertices[1]);
    assert_eq!(t1.p3, obj_parser.vertices[2]);
    assert_eq!(t2.p1, obj_parser.vertices[0]);
    assert_eq!(t2.p2, obj_parser.vertices[2]);
    assert_eq!(t2.p3, obj_parser.vertices[3]);
    assert_eq!(t3.p1, obj_parser.vertices[0]);
    assert_eq!(t3.p2, obj_parser.vertices[3]);
    assert_eq!(t3.p3, obj_parser.vertices[4]);
}

#[test]
fn triangles_in_groups() {
    let obj_parser = parse_str(
        "v -1 1 0\nv -1 0 0\nv 1 0 0\nv 1 1 0\n\
         g FirstGroup\nf 1 2 3\ng SecondGroup\nf 1 3 4\n"
    ).unwrap();

    let first = &obj_parser.groups["FirstGroup"];
    let second = &obj_parser.groups["SecondGroup"];
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert!(obj_parser.default_group().is_empty());

    let t1 = triangle_info(&first[0]);
    let t2 = triangle_info(&second[0]);
    assert_eq!(t1.p3, obj_parser.vertices[2]);
    assert_eq!(t2.p3, obj_parser.vertices[3]);
}

#[test]
fn converting_to_a_group() {
    let obj_parser = parse_str(
        "v -1 1 0\nv -1 0 0\nv 1 0 0\nv 1 1 0\n\
         f 1 2 4\ng FirstGroup\nf 1 2 3\ng SecondGroup\nf 1 3 4\n"
    ).unwrap();

    let mut shapes = Shapes::new();
    let root = obj_parser.into_group(&mut shapes).unwrap();

    // One loose triangle plus the two named groups.
    let children = shapes[root].children().unwrap();
    assert_eq!(children.len(), 3);
    assert!(matches!(shapes[children[0]].ty(), ShapeType::Triangle(_)));
    for &group in &children[1..] {
        assert!(shapes[group].is_group());
        assert_eq!(shapes[group].children().unwrap().len(), 1);
        assert_eq!(shapes[group].parent(), Some(root));
    }
}

#[test]
fn vertex_normal_records() {
    let obj_parser = parse_str("vn 0 0 1\nvn 0.707 0 -0.707\nvn 1 2 3\n").unwrap();

    assert_eq!(obj_parser.normals[0], Tuple4D::vector(0.0, 0.0, 1.0));
    assert_eq!(obj_parser.normals[1], Tuple4D::vector(0.707, 0.0, -0.707));
    assert_eq!(obj_parser.normals[2], Tuple4D::vector(1.0, 2.0, 3.0));
}

#[test]
fn faces_with_normals() {
    let obj_parser = parse_str(
        "v 0 1 0\nv -1 0 0\nv 1 0 0\n\
         vn -1 0 0\nvn 1 0 0\nvn 0 1 0\n\
         f 1//3 2//1 3//2\nf 1/0/3 2/102/1 3/14/2\n"
    ).unwrap();

    let children = obj_parser.default_group();
    let t1 = smooth_triangle_info(&children[0]);
    let t2 = smooth_triangle_info(&children[1]);

    assert_eq!(t1.triangle_info.p1, obj_parser.vertices[0]);
    assert_eq!(t1.triangle_info.p2, obj_parser.vertices[1]);
    assert_eq!(t1.triangle_info.p3, obj_parser.vertices[2]);
    assert_eq!(t1.n1, obj_parser.normals[2]);
    assert_eq!(t1.n2, obj_parser.normals[0]);
    assert_eq!(t1.n3, obj_parser.normals[1]);
    assert_eq!(t1, t2);
}

#[test]
fn partial_normals_give_flat_triangles() {
    let obj_parser = parse_str("v 0 1 0\nv -1 0 0\nv 1 0 0\nvn 0 0 1\nf 1//1 2 3\n")
        .unwrap();

    assert!(matches!(obj_parser.default_group()[0].ty(), ShapeType::Triangle(_)));
}

#[test]
fn malformed_records_are_rejected() {
    let cases = [
        ("v 1 x 0\n", 1),
        ("v 1 2\n", 1),
        ("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2\n", 4),
        ("v 0 0 0\nv 1 0 0\nv 0 1 0\n\nf 1 2 4\n", 5),
        ("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n", 4),
        ("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1//1 2//1 3//1\n", 4),
    ];

    for (text, expected) in cases.iter() {
        match parse_str(text) {
            Err(TracerError::Obj { line, .. }) => assert_eq!(line, *expected, "{:?}", text),
            other => panic!("expected an OBJ error for {:?}, got {:?}", text, other),
        }
    }
}
