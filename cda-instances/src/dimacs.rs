use crate::generate::Instance;
use anyhow::{anyhow, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Read, Write},
    path::Path,
};

/// Writes `instance` in DIMACS CNF format.
pub fn write_dimacs<W: Write>(instance: &Instance, writer: W) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    writeln!(writer, "c random {}-SAT instance", instance.params.arity)?;
    writeln!(
        writer,
        "p cnf {} {}",
        instance.params.num_variables,
        instance.clauses.len()
    )?;
    for clause in instance.clauses.iter() {
        for literal in clause.iter() {
            write!(writer, "{} ", literal)?;
        }
        writeln!(writer, "0")?;
    }
    writer.flush()?;
    Ok(())
}

fn warn_on_clause_count(declared: usize, read: usize) {
    if declared != read {
        log::warn!("Header declares {} clauses but {} were read", declared, read);
    }
}

/// Reads a DIMACS CNF instance whose clauses all have the same arity.
///
/// A clause count that disagrees with the `p cnf` header is only reported as a
/// warning; the clauses actually present are used.
pub fn read_dimacs<R: Read>(reader: R) -> Result<Instance> {
    let reader = BufReader::new(reader);
    let mut header: Option<(usize, usize)> = None;
    let mut clauses: Vec<Vec<i32>> = Vec::new();
    let mut current: Vec<i32> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') || trimmed.starts_with('%') {
            continue;
        }
        if trimmed.starts_with('p') {
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() != 4 || fields[1] != "cnf" {
                return Err(anyhow!("Line {}: malformed header '{}'", line_no + 1, trimmed));
            }
            let num_variables = fields[2]
                .parse::<usize>()
                .map_err(|e| anyhow!("Line {}: bad variable count: {}", line_no + 1, e))?;
            let num_clauses = fields[3]
                .parse::<usize>()
                .map_err(|e| anyhow!("Line {}: bad clause count: {}", line_no + 1, e))?;
            header = Some((num_variables, num_clauses));
            continue;
        }
        if header.is_none() {
            return Err(anyhow!("Line {}: clause before 'p cnf' header", line_no + 1));
        }
        for token in trimmed.split_whitespace() {
            let literal = token
                .parse::<i32>()
                .map_err(|e| anyhow!("Line {}: bad literal '{}': {}", line_no + 1, token, e))?;
            if literal == 0 {
                clauses.push(std::mem::take(&mut current));
            } else {
                current.push(literal);
            }
        }
    }
    if !current.is_empty() {
        clauses.push(current);
    }

    let (num_variables, declared_clauses) =
        header.ok_or_else(|| anyhow!("Missing 'p cnf' header"))?;
    warn_on_clause_count(declared_clauses, clauses.len());
    let arity = clauses
        .first()
        .map(|c| c.len())
        .ok_or_else(|| anyhow!("No clauses after the 'p cnf' header"))?;
    if let Some((idx, clause)) = clauses.iter().enumerate().find(|(_, c)| c.len() != arity) {
        return Err(anyhow!(
            "Clause '{}' has {} literals, expected {}",
            idx,
            clause.len(),
            arity
        ));
    }
    if let Some(literal) = clauses
        .iter()
        .flatten()
        .find(|l| l.unsigned_abs() as usize > num_variables)
    {
        return Err(anyhow!(
            "Literal {} exceeds the declared {} variables",
            literal,
            num_variables
        ));
    }

    Ok(Instance::from_clauses(num_variables, arity, clauses))
}

/// Loads an instance from a `.json` (serde) or DIMACS file.
pub fn load_instance<P: AsRef<Path>>(path: P) -> Result<Instance> {
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|e| anyhow!("Failed to open '{}': {}", path.display(), e))?;
    if path.extension().map_or(false, |ext| ext == "json") {
        let instance: Instance = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| anyhow!("Failed to parse '{}': {}", path.display(), e))?;
        warn_on_clause_count(instance.params.num_clauses, instance.clauses.len());
        Ok(instance)
    } else {
        read_dimacs(file)
    }
}

pub fn save_instance<P: AsRef<Path>>(instance: &Instance, path: P) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).map_err(|e| anyhow!("Failed to create '{}': {}", path.display(), e))?;
    if path.extension().map_or(false, |ext| ext == "json") {
        serde_json::to_writer(BufWriter::new(file), instance)?;
        Ok(())
    } else {
        write_dimacs(instance, file)
    }
}
