//! `comp`: compress the RAM-initialization data of a 32-bit ELF firmware
//! image in place.
//!
//! Usage: `comp <arch> <infile.elf> <outfile.elf>`. The architecture tag
//! selects the decompressor blobs under `compression/<algo>/decompress/`.
//! The output file is only written after the whole rewrite succeeds.

use std::{env, fs, process};

use log::{info, LevelFilter};

use elfcomp::{compress::CodecConfig, elf::Elf, error::Result, rewrite};

fn run(arch: &str, infile: &str, outfile: &str) -> Result<()> {
    let data = fs::read(infile)?;
    let mut binary = Elf::parse_writable(&data)?;

    let config = CodecConfig::builder().arch(arch).build();
    rewrite::rewrite(&mut binary, &config)?;

    info!("Saving...");
    fs::write(outfile, binary.pack()?)?;
    info!("Done");
    Ok(())
}

fn main() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Debug)
        .format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "{}", record.args())
        })
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        let name = args.first().map(String::as_str).unwrap_or("comp");
        eprintln!("Usage: {name} <arch> <infile.elf> <outfile.elf>");
        process::exit(1);
    }

    if let Err(err) = run(&args[1], &args[2], &args[3]) {
        eprintln!("{err}");
        process::exit(1);
    }
}
