// src/privilege/argv.rs

//! Argument vectors for the privileged `prodreg` helper
//!
//! ```text
//! register -u <uuid> [-b <ver>]* [-c <uuid>{<inst>}{<ver>}]*
//!          [-d <uuid>{<inst>}{<ver>}]* [-D <attr>{<val>}]* [-n <name>{<lang>}]*
//!          [-p <loc>] [-P <uuid>{<inst>}{<ver>}] [-r <uuid>{<inst>}{<ver>}]*
//!          [-R <altroot>] [-t PRODUCT|FEATURE|COMPONENT] [-U <uname>]
//!          [-v <ver>] [-V <vendor>] [-x <uninstaller>]
//! unregister -u <uuid> -f [-R <altroot>] -i <inst>
//! ```
//!
//! The CLI parses the same encoding back, so every value survives the trip
//! through `execve` unchanged.

use super::escape::{escape, join_braced, split_braced, unescape};
use crate::error::{Error, Result};
use crate::registry::{Component, ComponentRef, ComponentType};
use std::path::Path;

/// Encode a reference as `uuid{instance}{version}`
pub fn encode_ref(r: &ComponentRef) -> String {
    let instance = r.instance.to_string();
    join_braced(&r.uuid, &[&instance, r.version.as_deref().unwrap_or("")])
}

/// Decode `uuid{instance}{version}`; missing fields default to 0 and none
pub fn decode_ref(arg: &str) -> Result<ComponentRef> {
    let (uuid, fields) = split_braced(arg)?;
    if uuid.is_empty() || fields.len() > 2 {
        return Err(Error::ParseError(format!("malformed component reference: {arg}")));
    }
    let instance = match fields.first().map(String::as_str) {
        None | Some("") => 0,
        Some(s) => s
            .parse()
            .map_err(|_| Error::ParseError(format!("bad instance in reference: {arg}")))?,
    };
    let version = fields.get(1).filter(|v| !v.is_empty()).cloned();
    Ok(ComponentRef::new(uuid, instance, version))
}

/// Decode `head{field}` pairs used by `-D` and `-n`
pub fn decode_pair(arg: &str) -> Result<(String, String)> {
    let (head, mut fields) = split_braced(arg)?;
    if fields.len() != 1 {
        return Err(Error::ParseError(format!("expected value{{key}}: {arg}")));
    }
    Ok((head, fields.remove(0)))
}

/// `-R` is a plain path argument, so the root is passed as is
fn alt_root_args(args: &mut Vec<String>, alt_root: Option<&Path>) {
    if let Some(root) = alt_root
        && root != Path::new("/")
    {
        args.push("-R".into());
        args.push(root.to_string_lossy().into_owned());
    }
}

/// Arguments that ask the helper to register `c`
pub fn register_args(c: &Component, alt_root: Option<&Path>) -> Vec<String> {
    let mut args = vec!["register".to_string(), "-u".into(), escape(&c.uuid)];

    for version in &c.compatible_versions {
        args.push("-b".into());
        args.push(escape(version));
    }
    for child in &c.children {
        args.push("-c".into());
        args.push(encode_ref(child));
    }
    for dependent in &c.dependents {
        args.push("-d".into());
        args.push(encode_ref(dependent));
    }
    for (name, value) in c.attributes.iter() {
        args.push("-D".into());
        args.push(join_braced(name, &[value]));
    }
    for (language, name) in &c.display_names {
        args.push("-n".into());
        args.push(join_braced(name, &[language]));
    }
    if let Some(location) = &c.location {
        args.push("-p".into());
        args.push(escape(location));
    }
    if let Some(parent) = &c.parent {
        args.push("-P".into());
        args.push(encode_ref(parent));
    }
    for required in &c.required {
        args.push("-r".into());
        args.push(encode_ref(required));
    }
    alt_root_args(&mut args, alt_root);
    if c.comp_type != ComponentType::Component {
        args.push("-t".into());
        args.push(c.comp_type.as_str().into());
    }
    if let Some(unique_name) = &c.unique_name {
        args.push("-U".into());
        args.push(escape(unique_name));
    }
    if let Some(version) = &c.version {
        args.push("-v".into());
        args.push(escape(version));
    }
    if let Some(vendor) = &c.vendor {
        args.push("-V".into());
        args.push(escape(vendor));
    }
    if let Some(uninstaller) = &c.uninstaller {
        args.push("-x".into());
        args.push(escape(uninstaller));
    }
    args
}

/// Arguments that ask the helper to unregister one instance
pub fn unregister_args(uuid: &str, instance: u32, alt_root: Option<&Path>) -> Vec<String> {
    let mut args = vec![
        "unregister".to_string(),
        "-u".into(),
        escape(uuid),
        "-f".into(),
    ];
    alt_root_args(&mut args, alt_root);
    args.push("-i".into());
    args.push(instance.to_string());
    args
}

/// Parsed (still escaped) values of a `register` invocation
#[derive(Debug, Clone, Default)]
pub struct RegisterArgs {
    pub uuid: String,
    pub compatible: Vec<String>,
    pub children: Vec<String>,
    pub dependents: Vec<String>,
    pub attributes: Vec<String>,
    pub names: Vec<String>,
    pub location: Option<String>,
    pub parent: Option<String>,
    pub required: Vec<String>,
    pub comp_type: Option<String>,
    pub unique_name: Option<String>,
    pub version: Option<String>,
    pub vendor: Option<String>,
    pub uninstaller: Option<String>,
}

impl RegisterArgs {
    /// Rebuild the component the arguments describe
    pub fn to_component(&self) -> Result<Component> {
        let mut c = Component::new(unescape(&self.uuid));
        c.compatible_versions = self.compatible.iter().map(|v| unescape(v)).collect();
        c.children = self
            .children
            .iter()
            .map(|a| decode_ref(a))
            .collect::<Result<_>>()?;
        c.dependents = self
            .dependents
            .iter()
            .map(|a| decode_ref(a))
            .collect::<Result<_>>()?;
        for arg in &self.attributes {
            let (name, value) = decode_pair(arg)?;
            c.attributes.set(name, value);
        }
        for arg in &self.names {
            let (name, language) = decode_pair(arg)?;
            c.set_display_name(&language, name);
        }
        c.location = self.location.as_deref().map(unescape);
        c.parent = self.parent.as_deref().map(decode_ref).transpose()?;
        c.required = self
            .required
            .iter()
            .map(|a| decode_ref(a))
            .collect::<Result<_>>()?;
        if let Some(t) = &self.comp_type {
            c.comp_type = t.parse().map_err(Error::ParseError)?;
        }
        c.unique_name = self.unique_name.as_deref().map(unescape);
        c.version = self.version.as_deref().map(unescape);
        c.vendor = self.vendor.as_deref().map(unescape);
        c.uninstaller = self.uninstaller.as_deref().map(unescape);
        Ok(c)
    }
}
