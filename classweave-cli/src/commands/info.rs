use std::path::Path;

use anyhow::Context;
use classweave::classfile::ClassFile;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_file,
    output::{print_output, Align, Columns},
};

#[derive(Debug, Serialize)]
pub struct ClassInfo {
    pub name: String,
    pub version: String,
    pub access: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub super_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    pub constant_pool_entries: usize,
    pub requires_frames: bool,
    pub fields: Vec<MemberEntry>,
    pub methods: Vec<MemberEntry>,
}

#[derive(Debug, Serialize)]
pub struct MemberEntry {
    pub access: String,
    pub name: String,
    pub descriptor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stack: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_locals: Option<u16>,
}

/// `PUBLIC | STATIC` style rendering of a bitflags value
fn flag_names<F>(names: impl Iterator<Item = (&'static str, F)>) -> String {
    names.map(|(name, _)| name).collect::<Vec<_>>().join(" | ")
}

fn collect(class: &ClassFile<'_>) -> anyhow::Result<ClassInfo> {
    let fields = class
        .fields()
        .iter()
        .map(|field| -> classweave::Result<MemberEntry> {
            Ok(MemberEntry {
                access: flag_names(field.field_access().iter_names()),
                name: class.member_name(field)?.to_string(),
                descriptor: class.member_descriptor(field)?.to_string(),
                code_length: None,
                max_stack: None,
                max_locals: None,
            })
        })
        .collect::<classweave::Result<Vec<_>>>()?;

    let mut methods = Vec::with_capacity(class.methods().len());
    for (slot, method) in class.methods().iter().enumerate() {
        let code = class.code(slot)?;
        methods.push(MemberEntry {
            access: flag_names(method.method_access().iter_names()),
            name: class.member_name(method)?.to_string(),
            descriptor: class.member_descriptor(method)?.to_string(),
            code_length: code.as_ref().map(|code| code.code.len()),
            max_stack: code.as_ref().map(|code| code.max_stack),
            max_locals: code.as_ref().map(|code| code.max_locals),
        });
    }

    Ok(ClassInfo {
        name: class.this_name()?.to_string(),
        version: format!("{}.{}", class.major_version, class.minor_version),
        access: flag_names(class.access().iter_names()),
        super_name: class.super_name()?.map(str::to_string),
        interfaces: class
            .interface_names()?
            .into_iter()
            .map(str::to_string)
            .collect(),
        constant_pool_entries: class.constant_pool().count(),
        requires_frames: class.requires_frames(),
        fields,
        methods,
    })
}

fn print_members(title: &str, members: &[MemberEntry], with_code: bool) {
    if members.is_empty() {
        return;
    }
    println!("\n{title}:");
    let mut columns = vec![
        ("Access", Align::Left),
        ("Name", Align::Left),
        ("Descriptor", Align::Left),
    ];
    if with_code {
        columns.extend([
            ("Code", Align::Right),
            ("Stack", Align::Right),
            ("Locals", Align::Right),
        ]);
    }
    let mut table = Columns::new(&columns).indent("  ");
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    for member in members {
        let mut row = vec![
            member.access.clone(),
            member.name.clone(),
            member.descriptor.clone(),
        ];
        if with_code {
            row.push(or_dash(member.code_length.map(|len| len.to_string())));
            row.push(or_dash(member.max_stack.map(|stack| stack.to_string())));
            row.push(or_dash(member.max_locals.map(|locals| locals.to_string())));
        }
        table.row(row);
    }
    table.print();
}

pub fn run(path: &Path, opts: &GlobalOptions) -> anyhow::Result<()> {
    let file = load_file(path)?;
    let class = ClassFile::parse(file.data())
        .with_context(|| format!("not a valid class file: {}", path.display()))?;
    let info = collect(&class)?;

    print_output(&info, opts, |info| {
        println!("Class:           {}", info.name);
        println!("Version:         {}", info.version);
        println!("Access:          {}", info.access);
        if let Some(super_name) = &info.super_name {
            println!("Super:           {super_name}");
        }
        if !info.interfaces.is_empty() {
            println!("Interfaces:      {}", info.interfaces.join(", "));
        }
        println!("Pool entries:    {}", info.constant_pool_entries);
        let frames = if info.requires_frames { "yes" } else { "no" };
        println!("Frames:          {frames}");
        println!("Fields:          {}", info.fields.len());
        println!("Methods:         {}", info.methods.len());

        print_members("Fields", &info.fields, false);
        print_members("Methods", &info.methods, true);
    })
}
