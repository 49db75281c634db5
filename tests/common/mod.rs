#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const RECORDS_CSV: &str = "id,age,sex\n1,34,1\n2,,2\n3,60,\n";

pub const CODEBOOK_CSV: &str = "variable,question,module,coding\n\
sex,Sex of deceased,general,\"1 \"\"Male\"\" 2 \"\"Female\"\"\"\n\
site,Study site,general,\"1 \"\"Kisumu\"\" 2 \"\"Nairobi\"\"\"\n\
cod,Cause of death,cod,\n";

/// A larger sample resembling a verbal autopsy export: site, sex, age and cause.
pub fn survey_csv(rows: usize) -> String {
    let causes = ["Malaria", "HIV/AIDS", "Road traffic accident", "Stroke"];
    let mut out = String::from("id,site,sex,age,cod\n");
    for i in 0..rows {
        let age = if i % 10 == 9 {
            String::new()
        } else {
            ((i * 7) % 90).to_string()
        };
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            i + 1,
            i % 2 + 1,
            i % 3 % 2 + 1,
            age,
            causes[i % causes.len()]
        ));
    }
    out
}

pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(content).unwrap();
    path
}

pub fn write_gzip(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap();
    path
}
