//! Creates a sample CESM-LME style NetCDF file for trying out climtrend.
//!
//! The file holds monthly precipitation on the noleap calendar with a linear
//! trend that strengthens towards the north, two ensemble members, and a few
//! fill values in the second member.

use ndarray::{Array1, Array4};
use netcdf::create;
use std::path::Path;

const YEARS: usize = 30;
const MEMBERS: usize = 2;
const FILL: f64 = 1.0e20;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = Path::new("data");
    std::fs::create_dir_all(data_dir)?;
    let output_path = data_dir.join("cesmlme_PRECTvolc.nc");

    println!("🔨 Creating test NetCDF file: {}", output_path.display());

    if output_path.exists() {
        std::fs::remove_file(&output_path)?
    }

    let mut file = create(&output_path)?;

    file.add_attribute("title", "Synthetic volcanic-forcing precipitation")?;
    file.add_attribute("source", "climtrend create_test_netcdf demo")?;

    let times = YEARS * 12;
    let lats: Vec<f64> = (0..9).map(|i| -80.0 + i as f64 * 20.0).collect();
    let lons: Vec<f64> = (0..12).map(|i| i as f64 * 30.0).collect();

    file.add_dimension("time", times)?;
    file.add_dimension("ensemble", MEMBERS)?;
    file.add_dimension("lat", lats.len())?;
    file.add_dimension("lon", lons.len())?;

    {
        let mut time_var = file.add_variable::<f64>("time", &["time"])?;
        time_var.put_attribute("units", "days since 0850-01-01 00:00:00")?;
        time_var.put_attribute("calendar", "noleap")?;
        time_var.put_attribute("long_name", "time")?;

        // Mid-month offsets on a 365-day year
        let time_data = Array1::from_shape_fn(times, |m| 15.0 + m as f64 * 365.0 / 12.0);
        time_var.put(time_data.view(), ..)?;
    }

    {
        let mut lat_var = file.add_variable::<f64>("lat", &["lat"])?;
        lat_var.put_attribute("units", "degrees_north")?;
        lat_var.put(Array1::from(lats.clone()).view(), ..)?;
    }

    {
        let mut lon_var = file.add_variable::<f64>("lon", &["lon"])?;
        lon_var.put_attribute("units", "degrees_east")?;
        lon_var.put(Array1::from(lons.clone()).view(), ..)?;
    }

    {
        let mut prect = file.add_variable::<f64>("PRECT", &["time", "ensemble", "lat", "lon"])?;
        prect.put_attribute("units", "m/s")?;
        prect.put_attribute("long_name", "Total precipitation rate")?;
        prect.put_attribute("_FillValue", FILL)?;

        let shape = (times, MEMBERS, lats.len(), lons.len());
        let data = Array4::from_shape_fn(shape, |(t, e, la, lo)| {
            if e == 1 && la == 0 && t % 50 == 7 {
                return FILL;
            }
            let years = t as f64 / 12.0;
            let seasonal = (2.0 * std::f64::consts::PI * (t % 12) as f64 / 12.0).sin() * 5.0e-9;
            let trend = (lats[la] / 80.0) * 2.0e-10 * years;
            let wobble = ((lo * 13 + t * 7 + e * 3) % 11) as f64 * 1.0e-10;
            3.0e-8 + seasonal + trend + wobble
        });
        prect.put(data.view(), ..)?;
    }

    println!("✅ Test NetCDF file created successfully!");
    println!("📁 File: {}", output_path.display());
    println!(
        "📊 Dimensions: time={}, ensemble={}, lat={}, lon={}",
        times,
        MEMBERS,
        lats.len(),
        lons.len()
    );
    println!("📈 Variable: PRECT (m/s), noleap calendar, fill values in member 1");
    println!("\n🔍 Try it:");
    println!("   cargo run -- --scenario cesmlme_PRECTvolc");
    println!("   cargo run -- --scenario cesmlme_PRECTvolc --allow-missing -v");

    Ok(())
}
