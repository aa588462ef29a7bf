//! Just enough WGSL reflection to look attributes and uniforms up by name.
//!
//! Programs declare their vertex inputs in a `struct VertexInput` and their
//! per-draw parameters in a `struct Uniforms`; field order and the standard
//! uniform address-space layout rules determine locations and byte offsets.

use anyhow::{Context, Result, bail};

pub const VERTEX_INPUT_STRUCT: &str = "VertexInput";
pub const UNIFORM_STRUCT: &str = "Uniforms";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInputField {
    pub name: String,
    pub location: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UniformBlock {
    pub fields: Vec<UniformField>,
    pub size: u32,
}

impl UniformBlock {
    pub fn field(&self, name: &str) -> Option<(usize, &UniformField)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
    }
}

pub fn vertex_inputs(source: &str) -> Result<Vec<VertexInputField>> {
    let Some(body) = struct_body(source, VERTEX_INPUT_STRUCT) else {
        return Ok(Vec::new());
    };

    let mut fields = Vec::new();
    for member in members(body) {
        let rest = member
            .strip_prefix("@location(")
            .with_context(|| format!("vertex input `{member}` has no @location"))?;
        let close = rest
            .find(')')
            .with_context(|| format!("unterminated @location in `{member}`"))?;
        let location = rest[..close]
            .trim()
            .parse()
            .with_context(|| format!("invalid @location in `{member}`"))?;
        let (name, _) = split_member(&rest[close + 1..])?;
        fields.push(VertexInputField {
            name: name.to_string(),
            location,
        });
    }

    Ok(fields)
}

pub fn uniform_block(source: &str) -> Result<Option<UniformBlock>> {
    let Some(body) = struct_body(source, UNIFORM_STRUCT) else {
        return Ok(None);
    };

    let mut block = UniformBlock::default();
    let mut offset = 0u32;
    let mut struct_align = 4u32;

    for member in members(body) {
        let (name, ty) = split_member(member)?;
        let (align, size) = layout_of(ty)?;
        offset = offset.next_multiple_of(align);
        block.fields.push(UniformField {
            name: name.to_string(),
            offset,
            size,
        });
        offset += size;
        struct_align = struct_align.max(align);
    }

    block.size = offset.next_multiple_of(struct_align.max(16));
    Ok(Some(block))
}

fn struct_body<'a>(source: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("struct {name}");
    for (index, _) in source.match_indices(&needle) {
        let rest = &source[index + needle.len()..];
        let trimmed = rest.trim_start();
        if !trimmed.starts_with('{') {
            continue;
        }
        let open = rest.find('{')?;
        let close = rest[open..].find('}')? + open;
        return Some(&rest[open + 1..close]);
    }
    None
}

fn members(body: &str) -> impl Iterator<Item = &str> {
    body.split(',')
        .map(|member| {
            member
                .lines()
                .map(|line| line.split("//").next().unwrap_or(""))
                .collect::<Vec<_>>()
        })
        .filter_map(|lines| {
            let line: &str = lines.into_iter().find(|line| !line.trim().is_empty())?;
            Some(line.trim())
        })
}

fn split_member(member: &str) -> Result<(&str, &str)> {
    let (name, ty) = member
        .split_once(':')
        .with_context(|| format!("struct member `{member}` has no type"))?;
    Ok((name.trim(), ty.trim()))
}

fn layout_of(ty: &str) -> Result<(u32, u32)> {
    let layout = match ty {
        "f32" | "i32" | "u32" => (4, 4),
        "vec2<f32>" | "vec2f" => (8, 8),
        "vec3<f32>" | "vec3f" => (16, 12),
        "vec4<f32>" | "vec4f" => (16, 16),
        "mat4x4<f32>" | "mat4x4f" => (16, 64),
        other => bail!("unsupported uniform type `{other}`"),
    };
    Ok(layout)
}
