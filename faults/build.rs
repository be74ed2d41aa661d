use std::{
    env,
    error::Error,
    fs::{self, File},
    io::Write,
    path::PathBuf,
    process,
};

struct FaultDef {
    /// The stable code for the fault. Documentation refers to faults by
    /// this code so it must not change between releases.
    code: String,
    /// The variant name of the fault in the generated enumeration.
    name: String,
    /// The diagnostic the generated program prints when the fault fires.
    message: String,
}

fn read_faults() -> Result<Vec<FaultDef>, Box<dyn Error>> {
    let mut src_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    src_path.push("resources");
    src_path.push("runtime-faults.csv");

    let src = fs::read_to_string(&src_path)
        .map_err(|e| format!("Unable to read '{}': {}", src_path.display(), e))?;

    let mut defs = vec![];
    let mut rdr = csv::Reader::from_reader(src.as_bytes());
    for result in rdr.records() {
        let record = result?;
        let code = record
            .get(0)
            .ok_or_else(|| format!("Record {:?} is not valid at column 0", record))?;
        let name = record
            .get(1)
            .ok_or_else(|| format!("Record {:?} is not valid at column 1", record))?;
        let message = record
            .get(2)
            .ok_or_else(|| format!("Record {:?} is not valid at column 2", record))?;
        if message.contains('"') || message.contains('\\') {
            return Err(format!("Message for {} must not contain quotes", name).into());
        }
        defs.push(FaultDef {
            code: code.to_string(),
            name: name.to_string(),
            message: message.to_string(),
        });
    }
    Ok(defs)
}

fn create_faults() -> Result<(), Box<dyn Error>> {
    // Tell Cargo that if the fault definitions change, to rerun this build script.
    println!("cargo:rerun-if-changed=resources/runtime-faults.csv");

    let defs = read_faults()?;

    let mut out_path = PathBuf::from(env::var("OUT_DIR")?);
    fs::create_dir_all(out_path.clone())
        .map_err(|e| format!("Unable to create output directory: {}", e))?;

    out_path.push("faults.rs");
    let mut out =
        File::create(out_path).map_err(|e| format!("Unable to create 'faults.rs': {}", e))?;

    // Create the enumeration definition
    out.write_all(b"/// A runtime fault that a generated program can raise.\n")?;
    out.write_all(b"#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]\n")?;
    out.write_all(b"pub enum Fault {\n")?;
    for def in &defs {
        out.write_all(format!("    {},\n", def.name).as_bytes())?;
    }
    out.write_all(b"}\n\n")?;

    out.write_all(b"impl Fault {\n")?;

    // Define ALL
    out.write_all(b"    /// Every fault, in code order.\n")?;
    out.write_all(b"    pub const ALL: &'static [Fault] = &[\n")?;
    for def in &defs {
        out.write_all(format!("        Fault::{},\n", def.name).as_bytes())?;
    }
    out.write_all(b"    ];\n\n")?;

    // Define code()
    out.write_all(b"    /// Returns the code for the particular fault as a string.\n")?;
    out.write_all(b"    pub fn code(&self) -> &'static str {\n")?;
    out.write_all(b"        match self {\n")?;
    for def in &defs {
        out.write_all(
            format!("            Fault::{} => \"{}\",\n", def.name, def.code).as_bytes(),
        )?;
    }
    out.write_all(b"        }\n")?;
    out.write_all(b"    }\n\n")?;

    // Define message()
    out.write_all(b"    /// Returns the diagnostic that the generated program reports.\n")?;
    out.write_all(b"    pub fn message(&self) -> &'static str {\n")?;
    out.write_all(b"        match self {\n")?;
    for def in &defs {
        out.write_all(
            format!("            Fault::{} => \"{}\",\n", def.name, def.message).as_bytes(),
        )?;
    }
    out.write_all(b"        }\n")?;
    out.write_all(b"    }\n")?;

    out.write_all(b"}\n")?;

    out.flush()?;

    Ok(())
}

fn main() {
    if let Err(err) = create_faults() {
        println!("problem generating faults.rs: {}", err);
        process::exit(1);
    }
}
