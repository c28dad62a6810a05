//! Wavefront OBJ record emission.
//!
//! Formats a cleaned model as OBJ text on any [`Write`] sink. Opening
//! files, choosing material tables and assembling whole documents stay
//! with the caller; this module only knows how to render vertices and
//! primitives the way downstream OBJ consumers expect them.

use std::io::{self, Write};

use tracing::trace;

use crate::elements::{Group, Primitive, VertexPool};

/// How face records refer to vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexStyle {
    /// 1-based indices counted from the start of the whole file.
    Positive,
    /// Negative offsets relative to the current object's vertices.
    Negative,
}

/// How polygons with more than three sides are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshStyle {
    /// One face record per polygon.
    NoChange,
    /// Triangles sharing the polygon's first vertex.
    TriangleFan,
    /// Triangles alternating from both ends of the polygon.
    TriangleStrip,
}

fn side_or_err(prim: &Primitive, s: usize) -> io::Result<usize> {
    prim.side(s).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("primitive has no side {s}"),
        )
    })
}

fn convert_vnum(
    pool: &VertexPool,
    v: usize,
    vtotal: usize,
    vobject: usize,
    vstyle: VertexStyle,
) -> io::Result<i64> {
    let id = pool.id_of(v).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("vertex {v} is not in the pool"),
        )
    })?;

    Ok(match vstyle {
        VertexStyle::Negative => -(vobject as i64 - id as i64),
        VertexStyle::Positive => 1 + vtotal as i64 + id as i64,
    })
}

/// Writes a `v` record for every marked vertex, in insertion order.
///
/// `vobject` is the number of marked vertices, reported in a leading
/// comment. Unmarked vertices (including duplicates whose mark was
/// transferred away) are omitted, which is why emission must follow
/// [`VertexPool::renumber`].
pub fn write_vertices<W: Write>(out: &mut W, vobject: usize, pool: &VertexPool) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "# {vobject} vertices")?;

    for v in 0..pool.len() {
        if !pool.is_used(v) {
            trace!(v, "omitting unused vertex from the output");
            continue;
        }

        let coords = pool.coords(v).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("vertex {v} is not in the pool"),
            )
        })?;
        writeln!(out, "v {:.6} {:.6} {:.6}", coords.x, coords.y, coords.z)?;
    }

    Ok(())
}

fn write_primitive<W: Write>(
    out: &mut W,
    prim: &Primitive,
    vtotal: usize,
    vobject: usize,
    pool: &VertexPool,
    vstyle: VertexStyle,
    mstyle: MeshStyle,
) -> io::Result<()> {
    let nsides = prim.num_sides();
    if nsides == 0 {
        trace!("skipping empty primitive");
        return Ok(());
    }

    if nsides > 3 && mstyle != MeshStyle::NoChange {
        let mut v = [0i64; 3];
        for (s, value) in v.iter_mut().take(2).enumerate() {
            *value = convert_vnum(pool, side_or_err(prim, s)?, vtotal, vobject, vstyle)?;
        }

        for s in 2..nsides {
            let sindex = match mstyle {
                MeshStyle::TriangleFan => {
                    // Count up from side 2 to the last.
                    s
                }
                MeshStyle::TriangleStrip => {
                    if s % 2 == 1 {
                        // Odd iterations count down from the last side.
                        nsides - (s - 1) / 2
                    } else {
                        // Even iterations count up from side 2.
                        1 + s / 2
                    }
                }
                MeshStyle::NoChange => unreachable!(),
            };

            // Replace the first or third vertex (always the third when
            // making triangle fans).
            let vnext = convert_vnum(pool, side_or_err(prim, sindex)?, vtotal, vobject, vstyle)?;
            if mstyle == MeshStyle::TriangleFan || s % 2 == 0 {
                v[2] = vnext;
            } else {
                v[0] = vnext;
            }

            write!(out, "f")?;
            for value in v {
                write!(out, " {value}")?;
            }
            writeln!(out)?;

            // Keep the first or third vertex for the next iteration
            // (always the third when making triangle fans).
            v[1] = if mstyle == MeshStyle::TriangleFan || s % 2 == 1 {
                v[2]
            } else {
                v[0]
            };
        }
    } else {
        let record = match nsides {
            1 => "p",
            2 => "l",
            _ => "f",
        };
        write!(out, "{record}")?;
        for side in prim.sides() {
            write!(out, " {}", convert_vnum(pool, side, vtotal, vobject, vstyle)?)?;
        }
        writeln!(out)?;
    }

    Ok(())
}

/// Writes `g`, `usemtl` and face/line/point records for every group.
///
/// `vtotal` is the number of vertices written for previous objects and
/// `vobject` the number written for this one; together with the
/// [`VertexStyle`] they determine how face records refer to vertices.
/// `get_colour` can override each primitive's colour and `get_material`
/// maps a colour to a material name (default `colour_<n>`); a `usemtl`
/// record is only emitted when the colour changes.
#[allow(clippy::too_many_arguments)]
pub fn write_primitives<W: Write>(
    out: &mut W,
    object_name: &str,
    vtotal: usize,
    vobject: usize,
    pool: &VertexPool,
    groups: &[Group],
    get_colour: Option<&dyn Fn(&Primitive) -> u32>,
    get_material: Option<&dyn Fn(u32) -> String>,
    vstyle: VertexStyle,
    mstyle: MeshStyle,
) -> io::Result<()> {
    let mut last_colour = None;

    for (g, group) in groups.iter().enumerate() {
        if !group.is_empty() {
            writeln!(out)?;
            writeln!(out, "# {} primitives", group.len())?;
            writeln!(out, "g {object_name} {object_name}_{g}")?;
        }

        for prim in group.iter() {
            let colour = match get_colour {
                Some(get_colour) => get_colour(prim),
                None => prim.colour(),
            };

            if last_colour != Some(colour) {
                let material = match get_material {
                    Some(get_material) => get_material(colour),
                    None => format!("colour_{colour}"),
                };
                writeln!(out, "usemtl {material}")?;
                last_colour = Some(colour);
            }

            write_primitive(out, prim, vtotal, vobject, pool, vstyle, mstyle)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn pooled_polygon(pool: &mut VertexPool, corners: &[DVec3]) -> Primitive {
        let mut prim = Primitive::new();
        for &c in corners {
            let v = pool.add(c);
            prim.add_side(v).unwrap();
        }
        prim
    }

    fn pentagon(pool: &mut VertexPool) -> Primitive {
        pooled_polygon(
            pool,
            &[
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(2.0, 0.0, 0.0),
                DVec3::new(3.0, 2.0, 0.0),
                DVec3::new(1.0, 3.0, 0.0),
                DVec3::new(-1.0, 2.0, 0.0),
            ],
        )
    }

    fn emit(
        pool: &VertexPool,
        groups: &[Group],
        vstyle: VertexStyle,
        mstyle: MeshStyle,
    ) -> String {
        let mut out = Vec::new();
        write_primitives(
            &mut out, "model", 0, pool.len(), pool, groups, None, None, vstyle, mstyle,
        )
        .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_write_vertices_skips_unmarked() {
        let mut pool = VertexPool::new();
        pool.add(DVec3::new(0.0, 0.0, 0.0));
        pool.add(DVec3::new(1.5, 0.0, 0.0));
        pool.add(DVec3::new(2.0, 3.0, -1.0));
        pool.set_used(0);
        pool.set_used(2);
        pool.renumber(false);

        let mut out = Vec::new();
        write_vertices(&mut out, 2, &pool).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\n# 2 vertices\n\
             v 0.000000 0.000000 0.000000\n\
             v 2.000000 3.000000 -1.000000\n"
        );
    }

    #[test]
    fn test_faces_lines_and_points() {
        let mut pool = VertexPool::new();
        let mut group = Group::new();
        group.push(pooled_polygon(
            &mut pool,
            &[DVec3::ZERO, DVec3::X, DVec3::Y],
        ));
        group.push(pooled_polygon(&mut pool, &[DVec3::Z, DVec3::ONE]));
        group.push(pooled_polygon(&mut pool, &[DVec3::new(5.0, 0.0, 0.0)]));

        let text = emit(&pool, &[group], VertexStyle::Positive, MeshStyle::NoChange);
        assert_eq!(
            text,
            "\n# 3 primitives\n\
             g model model_0\n\
             usemtl colour_0\n\
             f 1 2 3\n\
             l 4 5\n\
             p 6\n"
        );
    }

    #[test]
    fn test_triangle_fan() {
        let mut pool = VertexPool::new();
        let mut group = Group::new();
        group.push(pentagon(&mut pool));

        let text = emit(&pool, &[group], VertexStyle::Positive, MeshStyle::TriangleFan);
        assert_eq!(
            text,
            "\n# 1 primitives\n\
             g model model_0\n\
             usemtl colour_0\n\
             f 1 2 3\n\
             f 1 3 4\n\
             f 1 4 5\n"
        );
    }

    #[test]
    fn test_triangle_strip() {
        let mut pool = VertexPool::new();
        let mut group = Group::new();
        group.push(pentagon(&mut pool));

        let text = emit(
            &pool,
            &[group],
            VertexStyle::Positive,
            MeshStyle::TriangleStrip,
        );
        assert_eq!(
            text,
            "\n# 1 primitives\n\
             g model model_0\n\
             usemtl colour_0\n\
             f 1 2 3\n\
             f 5 1 3\n\
             f 5 3 4\n"
        );
    }

    #[test]
    fn test_remeshing_leaves_triangles_alone() {
        let mut pool = VertexPool::new();
        let mut group = Group::new();
        group.push(pooled_polygon(
            &mut pool,
            &[DVec3::ZERO, DVec3::X, DVec3::Y],
        ));

        let fan = emit(&pool, &[group], VertexStyle::Positive, MeshStyle::TriangleFan);
        assert!(fan.contains("f 1 2 3\n"));
        assert_eq!(fan.matches("\nf ").count(), 1);
    }

    #[test]
    fn test_negative_vertex_numbering() {
        let mut pool = VertexPool::new();
        let mut group = Group::new();
        group.push(pooled_polygon(
            &mut pool,
            &[DVec3::ZERO, DVec3::X, DVec3::Y],
        ));

        let text = emit(&pool, &[group], VertexStyle::Negative, MeshStyle::NoChange);
        assert!(text.contains("f -3 -2 -1\n"));
    }

    #[test]
    fn test_usemtl_follows_colour_runs_and_callbacks() {
        let mut pool = VertexPool::new();
        let mut group = Group::new();

        let mut red = pooled_polygon(&mut pool, &[DVec3::ZERO, DVec3::X, DVec3::Y]);
        red.set_colour(1);
        let mut also_red = pooled_polygon(&mut pool, &[DVec3::ZERO, DVec3::X, DVec3::Z]);
        also_red.set_colour(1);
        let mut blue = pooled_polygon(&mut pool, &[DVec3::ZERO, DVec3::Y, DVec3::Z]);
        blue.set_colour(2);
        group.push(red);
        group.push(also_red);
        group.push(blue);

        let mut out = Vec::new();
        let name_material = |colour: u32| -> String {
            match colour {
                1 => "red".to_owned(),
                _ => "blue".to_owned(),
            }
        };
        write_primitives(
            &mut out,
            "model",
            0,
            pool.len(),
            &pool,
            std::slice::from_ref(&group),
            None,
            Some(&name_material),
            VertexStyle::Positive,
            MeshStyle::NoChange,
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("usemtl").count(), 2);
        assert!(text.contains("usemtl red\n"));
        assert!(text.contains("usemtl blue\n"));
    }

    #[test]
    fn test_empty_groups_emit_nothing() {
        let pool = VertexPool::new();
        let text = emit(
            &pool,
            &[Group::new(), Group::new()],
            VertexStyle::Positive,
            MeshStyle::NoChange,
        );
        assert!(text.is_empty());
    }
}
