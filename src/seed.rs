// Default fleet written on first run

use crate::vehicle::Vehicle;

#[allow(clippy::too_many_arguments)]
fn car(
    name: &str,
    available: bool,
    vehicle_type: &str,
    rating: f64,
    image_path: &str,
    mileage: &str,
    max_speed: &str,
    seats: &str,
    transmission: &str,
    vehicle_class: &str,
    price: f64,
    release_date: &str,
) -> Vehicle {
    Vehicle {
        name: name.to_string(),
        available,
        vehicle_type: vehicle_type.to_string(),
        rating,
        image_path: image_path.to_string(),
        mileage: mileage.to_string(),
        max_speed: max_speed.to_string(),
        seats: seats.to_string(),
        transmission: transmission.to_string(),
        vehicle_class: vehicle_class.to_string(),
        price,
        release_date: release_date.to_string(),
    }
}

/// The sixteen cars an empty installation starts with
pub fn default_fleet() -> Vec<Vehicle> {
    vec![
        car("Haval H6", true, "SUV", 4.2, "src/Images/hav.jpg", "12 km/l", "180 km/h", "5", "Automatic", "SUV", 35000.0, "2023-01-15"),
        car("Fortuner", true, "SUV", 4.6, "src/Images/fort.jpg", "9 km/l", "190 km/h", "7", "Automatic", "SUV", 55000.0, "2022-03-20"),
        car("Toyota Corolla", true, "Sedan", 4.4, "src/Images/tc.jpg", "14 km/l", "195 km/h", "5", "Manual", "Sedan", 28000.0, "2023-05-10"),
        car("Toyota Yaris", false, "Sedan", 4.0, "src/Images/y.jpg", "17 km/l", "170 km/h", "5", "Automatic", "Sedan", 22000.0, "2021-11-01"),
        car("Honda Vezel", true, "SUV", 4.5, "src/Images/v.jpg", "18 km/l", "185 km/h", "5", "Automatic", "Compact SUV", 32000.0, "2024-02-28"),
        car("Honda City", true, "Sedan", 4.3, "src/Images/hcity.jpg", "16 km/l", "175 km/h", "5", "Manual", "Sedan", 24000.0, "2023-07-22"),
        car("Honda Civic", false, "Sedan", 4.7, "src/Images/hcivic.jpg", "13 km/l", "200 km/h", "5", "Automatic", "Sport Sedan", 38000.0, "2024-01-05"),
        car("Changan Alsvin", false, "Sedan", 4.1, "src/Images/alsvin.jpg", "15 km/l", "180 km/h", "5", "Manual", "Subcompact", 18000.0, "2022-09-10"),
        car("Suzuki Swift", true, "Hatchback", 4.0, "src/Images/s_swift.jpg", "19 km/l", "160 km/h", "5", "Manual", "Hatchback", 19000.0, "2023-04-01"),
        car("Hyundai Tucson", true, "SUV", 4.3, "src/Images/h_tucson.jpg", "11 km/l", "185 km/h", "5", "Automatic", "Mid-size SUV", 40000.0, "2023-09-18"),
        car("Kia Sportage", true, "SUV", 4.5, "src/Images/k_sportage.jpg", "10 km/l", "190 km/h", "5", "Automatic", "Mid-size SUV", 42000.0, "2024-03-01"),
        car("Audi A4", true, "Luxury Sedan", 4.8, "src/Images/a_a4.jpg", "10 km/l", "220 km/h", "5", "Automatic", "Luxury Sedan", 65000.0, "2023-11-20"),
        car("BMW X5", false, "Luxury SUV", 4.9, "src/Images/bmw_x5.jpg", "8 km/l", "240 km/h", "5", "Automatic", "Luxury SUV", 85000.0, "2022-07-15"),
        car("Mercedes C-Class", true, "Luxury Sedan", 4.7, "src/Images/merc_c.jpg", "11 km/l", "210 km/h", "5", "Automatic", "Luxury Sedan", 70000.0, "2024-01-10"),
        car("Tesla Model 3", true, "Electric", 4.9, "src/Images/tesla_m3.jpg", "400 km range", "225 km/h", "5", "Automatic", "Electric Sedan", 60000.0, "2023-06-01"),
        car("Ford Mustang", true, "Sports Car", 4.7, "src/Images/Ford_Mustang.jpg", "9 km/l", "250 km/h", "2", "Manual", "Muscle Car", 50000.0, "2023-02-14"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_fleet_names_unique() {
        let fleet = default_fleet();
        assert_eq!(fleet.len(), 16);
        let names: HashSet<&str> = fleet.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names.len(), fleet.len());
    }
}
