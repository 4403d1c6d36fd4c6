use anyhow::{bail, Context, Result};

use featurelink::identifier::{row_key, FeatureId};

/// Print a feature identifier, or the parts of one
pub fn run(id: Option<String>, row_id: Option<u64>, mz: Option<f64>, rt: Option<f64>) -> Result<()> {
    match (id, row_id, mz, rt) {
        (None, Some(row_id), Some(mz), Some(rt)) => {
            println!("{}", FeatureId::new(row_id, mz, rt));
        }
        (Some(id), None, None, None) if id.contains('/') => {
            let feature: FeatureId = id
                .parse()
                .with_context(|| format!("Failed to parse feature identifier: {}", id))?;
            println!("row ID: {}", feature.row_id);
            println!("m/z:    {}", feature.rounded_mz());
            println!("RT:     {}", feature.rounded_rt());
            println!("key:    {}", feature.key());
        }
        (Some(id), None, None, None) => println!("{}", row_key(&id)),
        _ => bail!("Pass either an identifier or --row-id, --mz and --rt"),
    }
    Ok(())
}
