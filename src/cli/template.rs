use crate::error::Result;
use crate::importer::ImportKind;
use crate::settings::shellexpand_path;

pub fn run(kind: &str, output: Option<&str>) -> Result<()> {
    let kind = ImportKind::from_key(kind)?;
    match output {
        Some(path) => {
            let path = shellexpand_path(path);
            std::fs::write(&path, kind.template())?;
            println!("Wrote {} template to {path}", kind.key());
        }
        None => print!("{}", kind.template()),
    }
    Ok(())
}
