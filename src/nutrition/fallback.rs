use super::dataset::{NutritionTable, TableRow};

/// Built-in values for very common dishes, used when neither the dataset nor
/// the API answer.
pub fn fallback_table() -> NutritionTable {
    NutritionTable::new(vec![
        TableRow::new("cheeseburger", 340.0, 25.0, 29.0, 18.0),
        TableRow::new("cheese sandwich", 310.0, 15.0, 33.0, 14.0),
        TableRow::new("chicken burgers", 330.0, 28.0, 27.0, 16.0),
        TableRow::new("spicy chicken", 280.0, 26.0, 24.0, 12.0),
        TableRow::new("hot dog", 290.0, 11.0, 27.0, 20.0),
        TableRow::new("fruit salad", 150.0, 2.0, 38.0, 0.5),
        TableRow::new("cocktails", 210.0, 0.0, 28.0, 0.0),
        TableRow::new("nuggets", 250.0, 14.0, 15.0, 15.0),
        TableRow::new("sandwich", 220.0, 12.0, 25.0, 8.0),
        TableRow::new("french fries", 320.0, 3.0, 42.0, 17.0),
        TableRow::new("milk shake", 330.0, 8.0, 45.0, 12.0),
        TableRow::new("iced", 90.0, 0.0, 23.0, 0.0),
        TableRow::new("orange juice", 110.0, 2.0, 26.0, 0.0),
        TableRow::new("lemon tea", 70.0, 0.0, 19.0, 0.0),
        TableRow::new("coffee", 5.0, 0.0, 1.0, 0.0),
        TableRow::new("tea", 2.0, 0.0, 1.0, 0.0),
    ])
}
